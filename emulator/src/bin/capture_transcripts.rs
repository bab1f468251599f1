use std::io;
use std::path::Path;
use std::time::Duration;

#[allow(dead_code)]
#[path = "../harness.rs"]
mod harness;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::Session;

fn main() -> io::Result<()> {
    record_measurement()?;
    record_configuration()?;
    Ok(())
}

fn record_measurement() -> io::Result<()> {
    let mut session = Session::new(
        Duration::from_millis(50),
        Path::new("evidence/emulator-measurement.log"),
    )?;

    session.handle_completion("tri", 3)?;
    session.handle_completion("la", 2)?;

    let _ = session.handle_command("unlock")?;
    let _ = session.handle_command("config reset 100ms")?;
    let _ = session.handle_command("trigger")?;
    let _ = session.handle_command("latency")?;
    let _ = session.handle_command("status")?;
    Ok(())
}

fn record_configuration() -> io::Result<()> {
    let mut session = Session::new(
        Duration::from_millis(5),
        Path::new("evidence/emulator-configuration.log"),
    )?;

    session.handle_completion("conf", 4)?;
    session.handle_completion("config ", 7)?;
    session.handle_completion("config stimulus ", 16)?;
    session.handle_completion("config response re", 18)?;

    let _ = session.handle_command("config show")?;
    let _ = session.handle_command("config stimulus toggle")?;
    let _ = session.handle_command("unlock")?;
    let _ = session.handle_command("config stimulus toggle")?;
    let _ = session.handle_command("config response reverse")?;
    let _ = session.handle_command("react 10ms")?;
    let _ = session.handle_command("trigger")?;
    let _ = session.handle_command("help config")?;
    Ok(())
}
