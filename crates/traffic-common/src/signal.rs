use std::sync::{atomic::AtomicBool, Arc};

/// Registers SIGINT and SIGTERM onto a shared flag that long-running loops poll
/// to shut down gracefully.
pub fn setup_signal_handlers() -> Result<Arc<AtomicBool>, std::io::Error> {
    let signal_flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, signal_flag.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, signal_flag.clone())?;
    Ok(signal_flag)
}
