//! Ledger backend selection.
//!
//! The ledger is constructed exactly once at startup and handed to the
//! request layer through `AppState`. Chain-backed implementations are not
//! wired up yet; selecting one warns and falls back to the in-memory mock so
//! a misconfigured environment still serves requests.

use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::audit::AccessAuditor;
use crate::cipher::CipherService;
use crate::machine::{AuthorizationRegistry, MachineIdentity};

use super::mock::MockLedger;
use super::RewardsLedger;

/// Configured ledger backend (`USE_LEDGER`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Mock,
    LocalChain,
    Testnet,
}

impl FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(LedgerBackend::Mock),
            "localchain" => Ok(LedgerBackend::LocalChain),
            "testnet" => Ok(LedgerBackend::Testnet),
            other => Err(format!(
                "Unknown ledger backend '{other}' (expected mock, localchain or testnet)"
            )),
        }
    }
}

/// Build the process-wide ledger instance.
pub fn build_ledger(
    backend: LedgerBackend,
    identity: Arc<MachineIdentity>,
    registry: Arc<AuthorizationRegistry>,
    cipher: Arc<CipherService>,
    auditor: Arc<AccessAuditor>,
) -> Arc<dyn RewardsLedger> {
    match backend {
        LedgerBackend::Mock => info!("Using in-memory mock ledger"),
        LedgerBackend::LocalChain | LedgerBackend::Testnet => {
            warn!(?backend, "Ledger backend not implemented - falling back to mock");
        }
    }
    Arc::new(MockLedger::new(identity, registry, cipher, auditor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("mock".parse::<LedgerBackend>().unwrap(), LedgerBackend::Mock);
        assert_eq!(
            "LOCALCHAIN".parse::<LedgerBackend>().unwrap(),
            LedgerBackend::LocalChain
        );
        assert_eq!(
            "testnet".parse::<LedgerBackend>().unwrap(),
            LedgerBackend::Testnet
        );
        assert!("mainnet".parse::<LedgerBackend>().is_err());
    }
}
