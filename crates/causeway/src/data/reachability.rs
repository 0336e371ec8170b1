/// Network connectivity classification.
///
/// Fed asynchronously by connectivity observations; requests read the
/// latest value once at submission and accept a bounded staleness window
/// rather than blocking on a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reachability {
    /// Connectivity has not been observed yet.
    #[default]
    Unknown,
    /// No route to the network.
    Unreachable,
    /// Cellular data connection.
    Cellular,
    /// Wi-Fi connection.
    Wifi,
}

impl Reachability {
    /// Whether a request has any chance of leaving the device.
    ///
    /// `Unknown` counts as connected: before the first observation the
    /// network is given the benefit of the doubt.
    pub fn is_connected(&self) -> bool {
        !matches!(self, Reachability::Unreachable)
    }
}
