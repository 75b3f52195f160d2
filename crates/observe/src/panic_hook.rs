/// Installs a panic hook that emits panics through `tracing` so they end up
/// in the structured log stream instead of raw stderr.
pub fn install() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(%location, "thread panicked: {info}");
        default_hook(info);
    }));
}
