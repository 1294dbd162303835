pub enum DaemonEvent {
    /// The keyboard hook's message pump ended without being asked to.
    HookExited,
    /// Ctrl+C received; the daemon should tear down the hook and overlays and exit.
    Shutdown,
}
