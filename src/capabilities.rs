use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoSupport {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidProbe {
    Available,
    Unavailable,
}

#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub crypto: CryptoSupport,
    pub pid_probe: PidProbe,
}

impl Capabilities {
    pub fn detect() -> Self {
        let crypto = if cfg!(feature = "crypto") {
            CryptoSupport::Available
        } else {
            CryptoSupport::Unavailable
        };
        let pid_probe = if cfg!(feature = "proc-detect") {
            PidProbe::Available
        } else {
            PidProbe::Unavailable
        };
        info!(?crypto, ?pid_probe, "detected capabilities");
        Self { crypto, pid_probe }
    }
}
