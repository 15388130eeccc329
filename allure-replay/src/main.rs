// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use allure_replay::ReplayApp;
use clap::Parser;
use color_eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let app = ReplayApp::parse();
    let output = app.init_output();
    app.exec(output, &mut std::io::stdout().lock())?;
    Ok(())
}
