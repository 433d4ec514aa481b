//! Transaction execution: approval, resubmission and receipt tracking.
//!
//! The approve → refetch → submit path is an explicit phase machine rather
//! than recursive re-entry, so the sequencing invariant (never submit the
//! main transaction before a required approval receipt succeeds) is visible
//! in the control flow.

pub mod erc20;
mod provider;
pub mod rpc;

pub use provider::{ReceiptStatus, TransactionReceipt, TransactionRequest, WalletProvider};

use tracing::{info, warn};

use crate::api::{CommandBackend, TransactionDescriptor};
use crate::chains;
use crate::error::{ExecutorError, ProviderError, ProviderFault};

/// Gas limit used for the approval leg (100k, plenty for `approve`).
const APPROVAL_GAS_LIMIT: &str = "0x186a0";

/// Progress notifications emitted while a transaction executes. The session
/// renders these as intermediate log entries.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorEvent {
    Approving { token: String, spender: String },
    Approved { tx_hash: String },
    Refetching,
    Submitted { tx_hash: String, explorer_url: String },
}

/// Terminal result of a successful execution.
#[derive(Debug, Clone, PartialEq)]
pub struct TxOutcome {
    pub tx_hash: String,
    pub explorer_url: String,
}

/// Tagged state of the execution saga.
enum Phase {
    NeedsApproval,
    Approved,
    Refetching,
    Submitting,
    Submitted { tx_hash: String },
}

/// Drives one [`TransactionDescriptor`] to a terminal outcome.
///
/// Exactly one transaction is in flight per invocation; overlap avoidance is
/// the caller's responsibility. No failure is retried automatically.
pub struct TransactionExecutor<'a> {
    provider: &'a dyn WalletProvider,
    backend: &'a dyn CommandBackend,
}

impl<'a> TransactionExecutor<'a> {
    pub fn new(provider: &'a dyn WalletProvider, backend: &'a dyn CommandBackend) -> Self {
        Self { provider, backend }
    }

    pub async fn execute(
        &self,
        descriptor: TransactionDescriptor,
        wallet_address: &str,
        on_event: &mut (dyn FnMut(ExecutorEvent) + Send),
    ) -> Result<TxOutcome, ExecutorError> {
        descriptor
            .validate()
            .map_err(ExecutorError::InvalidDescriptor)?;

        let mut descriptor = descriptor;
        let mut phase = if descriptor.requires_approval() {
            Phase::NeedsApproval
        } else {
            Phase::Submitting
        };

        loop {
            match phase {
                Phase::NeedsApproval => {
                    let (Some(token), Some(spender)) = (
                        descriptor.token_to_approve.clone(),
                        descriptor.spender.clone(),
                    ) else {
                        return Err(ExecutorError::InvalidDescriptor(
                            "approval requested without token/spender".to_string(),
                        ));
                    };

                    on_event(ExecutorEvent::Approving {
                        token: token.clone(),
                        spender: spender.clone(),
                    });

                    let calldata = erc20::approve_calldata(&spender)
                        .map_err(ExecutorError::InvalidDescriptor)?;
                    let request = TransactionRequest {
                        from: wallet_address.to_string(),
                        to: token.clone(),
                        data: calldata,
                        value: "0x0".to_string(),
                        chain_id: descriptor.chain_id,
                        gas_limit: Some(APPROVAL_GAS_LIMIT.to_string()),
                        gas_price: None,
                        max_fee_per_gas: None,
                        max_priority_fee_per_gas: None,
                    };

                    let tx_hash = self.provider.send_transaction(&request).await?;
                    info!(%token, %tx_hash, "approval submitted");
                    let receipt = self.provider.wait_for_receipt(&tx_hash).await?;
                    if receipt.status == ReceiptStatus::Reverted {
                        warn!(%token, %tx_hash, "approval reverted");
                        return Err(ExecutorError::ApprovalFailed { token });
                    }

                    on_event(ExecutorEvent::Approved { tx_hash });
                    phase = Phase::Approved;
                }

                Phase::Approved => {
                    phase = if descriptor.pending_command.is_some() {
                        Phase::Refetching
                    } else {
                        Phase::Submitting
                    };
                }

                Phase::Refetching => {
                    // Quote and gas data were computed before the approval
                    // mined; replay the pending command for a fresh
                    // descriptor with the approval marked done.
                    on_event(ExecutorEvent::Refetching);
                    let command = descriptor.pending_command.clone().unwrap_or_default();
                    descriptor = self
                        .backend
                        .prepare_transaction(&command, wallet_address, descriptor.chain_id, true)
                        .await?;
                    descriptor
                        .validate()
                        .map_err(ExecutorError::InvalidDescriptor)?;
                    phase = Phase::Submitting;
                }

                Phase::Submitting => {
                    let request = TransactionRequest {
                        from: wallet_address.to_string(),
                        to: descriptor.to.clone(),
                        data: descriptor.data.clone(),
                        value: descriptor.value.clone(),
                        chain_id: descriptor.chain_id,
                        gas_limit: descriptor.gas_limit.clone(),
                        gas_price: descriptor.gas_price.clone(),
                        max_fee_per_gas: descriptor.max_fee_per_gas.clone(),
                        max_priority_fee_per_gas: descriptor.max_priority_fee_per_gas.clone(),
                    };

                    let tx_hash = self.provider.send_transaction(&request).await?;
                    info!(%tx_hash, chain_id = descriptor.chain_id, "transaction submitted");
                    on_event(ExecutorEvent::Submitted {
                        tx_hash: tx_hash.clone(),
                        explorer_url: chains::explorer_tx_url(descriptor.chain_id, &tx_hash),
                    });
                    phase = Phase::Submitted { tx_hash };
                }

                Phase::Submitted { tx_hash } => {
                    let receipt = self.provider.wait_for_receipt(&tx_hash).await?;
                    let explorer_url = chains::explorer_tx_url(descriptor.chain_id, &tx_hash);
                    return match receipt.status {
                        ReceiptStatus::Success => Ok(TxOutcome {
                            tx_hash,
                            explorer_url,
                        }),
                        ReceiptStatus::Reverted => {
                            warn!(%tx_hash, "transaction reverted on-chain");
                            Err(ExecutorError::Provider(ProviderError {
                                raw: format!("transaction {tx_hash} reverted on-chain"),
                                fault: ProviderFault::Revert(tx_hash),
                            }))
                        }
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::api::{CommandReply, CommandRequest, Quote, QuoteSheet};
    use crate::error::ApiError;

    #[derive(Default)]
    struct ScriptedProvider {
        calls: Mutex<Vec<String>>,
        reject_sends: bool,
        revert_first_receipt: bool,
    }

    #[async_trait]
    impl WalletProvider for ScriptedProvider {
        async fn send_transaction(
            &self,
            request: &TransactionRequest,
        ) -> Result<String, ProviderError> {
            if self.reject_sends {
                return Err(ProviderError::from_message(
                    "User denied transaction signature",
                ));
            }
            let mut calls = self.calls.lock().unwrap();
            let send_index = calls.iter().filter(|c| c.starts_with("send:")).count() + 1;
            calls.push(format!("send:{}", request.to));
            Ok(format!("0xhash{send_index}"))
        }

        async fn wait_for_receipt(
            &self,
            tx_hash: &str,
        ) -> Result<TransactionReceipt, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(format!("receipt:{tx_hash}"));
            let revert = self.revert_first_receipt && tx_hash == "0xhash1";
            Ok(TransactionReceipt {
                transaction_hash: tx_hash.to_string(),
                status: if revert {
                    ReceiptStatus::Reverted
                } else {
                    ReceiptStatus::Success
                },
                block_number: Some(1),
            })
        }

        async fn active_chain_id(&self) -> Result<u64, ProviderError> {
            Ok(8453)
        }
    }

    #[derive(Default)]
    struct RefetchBackend {
        prepared: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandBackend for RefetchBackend {
        async fn process_command(&self, _: &CommandRequest) -> Result<CommandReply, ApiError> {
            unimplemented!("not used by the executor")
        }
        async fn process_swap_command(&self, _: &CommandRequest) -> Result<CommandReply, ApiError> {
            unimplemented!("not used by the executor")
        }
        async fn process_dca_command(&self, _: &CommandRequest) -> Result<CommandReply, ApiError> {
            unimplemented!("not used by the executor")
        }
        async fn get_swap_quotes(&self, _: &str, _: u64) -> Result<QuoteSheet, ApiError> {
            unimplemented!("not used by the executor")
        }
        async fn execute_swap(
            &self,
            _: &str,
            _: u64,
            _: &Quote,
        ) -> Result<TransactionDescriptor, ApiError> {
            unimplemented!("not used by the executor")
        }

        async fn prepare_transaction(
            &self,
            command: &str,
            _wallet: &str,
            chain_id: u64,
            skip_approval: bool,
        ) -> Result<TransactionDescriptor, ApiError> {
            assert!(skip_approval, "refetch must mark the approval as done");
            self.prepared.lock().unwrap().push(command.to_string());
            Ok(TransactionDescriptor {
                to: "0xrouter".to_string(),
                data: "0xswapdata".to_string(),
                value: "0x0".to_string(),
                chain_id,
                method: Some("swap".to_string()),
                gas_limit: Some("0x5208".to_string()),
                gas_price: None,
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
                needs_approval: false,
                token_to_approve: None,
                spender: None,
                pending_command: None,
                skip_approval: true,
                agent_type: None,
                metadata: None,
            })
        }
    }

    fn approval_descriptor() -> TransactionDescriptor {
        TransactionDescriptor {
            to: "0xtoken".to_string(),
            data: "0x".to_string(),
            value: "0x0".to_string(),
            chain_id: 8453,
            method: Some("approve".to_string()),
            gas_limit: Some(APPROVAL_GAS_LIMIT.to_string()),
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            needs_approval: true,
            token_to_approve: Some("0xtoken".to_string()),
            spender: Some("0x6131B5fae19EA4f9D964eAc0408E4408b66337b5".to_string()),
            pending_command: Some("approved:swap 0.1 ETH for USDC".to_string()),
            skip_approval: false,
            agent_type: None,
            metadata: None,
        }
    }

    fn plain_descriptor() -> TransactionDescriptor {
        TransactionDescriptor {
            to: "0xrouter".to_string(),
            data: "0xswapdata".to_string(),
            value: "0x16345785d8a0000".to_string(),
            chain_id: 8453,
            method: Some("swap".to_string()),
            gas_limit: Some("0x5208".to_string()),
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            needs_approval: false,
            token_to_approve: None,
            spender: None,
            pending_command: None,
            skip_approval: false,
            agent_type: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn approval_runs_before_main_submission_with_refetch_between() {
        let provider = ScriptedProvider::default();
        let backend = RefetchBackend::default();
        let executor = TransactionExecutor::new(&provider, &backend);

        let mut events = Vec::new();
        let outcome = executor
            .execute(approval_descriptor(), "0xwallet", &mut |event| {
                events.push(event)
            })
            .await
            .unwrap();

        let calls = provider.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "send:0xtoken",
                "receipt:0xhash1",
                "send:0xrouter",
                "receipt:0xhash2",
            ]
        );
        assert_eq!(
            backend.prepared.lock().unwrap().as_slice(),
            ["approved:swap 0.1 ETH for USDC"]
        );
        assert!(matches!(events[0], ExecutorEvent::Approving { .. }));
        assert!(matches!(events[1], ExecutorEvent::Approved { .. }));
        assert_eq!(events[2], ExecutorEvent::Refetching);
        assert!(matches!(events[3], ExecutorEvent::Submitted { .. }));
        assert_eq!(outcome.tx_hash, "0xhash2");
        assert!(outcome.explorer_url.starts_with("https://basescan.org/tx/"));
    }

    #[tokio::test]
    async fn reverted_approval_aborts_before_main_submission() {
        let provider = ScriptedProvider {
            revert_first_receipt: true,
            ..ScriptedProvider::default()
        };
        let backend = RefetchBackend::default();
        let executor = TransactionExecutor::new(&provider, &backend);

        let err = executor
            .execute(approval_descriptor(), "0xwallet", &mut |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutorError::ApprovalFailed { .. }));
        let calls = provider.calls.lock().unwrap().clone();
        assert!(!calls.iter().any(|c| c == "send:0xrouter"));
        assert!(backend.prepared.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_descriptor_skips_the_approval_leg() {
        let provider = ScriptedProvider::default();
        let backend = RefetchBackend::default();
        let executor = TransactionExecutor::new(&provider, &backend);

        let mut events = Vec::new();
        executor
            .execute(plain_descriptor(), "0xwallet", &mut |event| {
                events.push(event)
            })
            .await
            .unwrap();

        assert!(matches!(events[0], ExecutorEvent::Submitted { .. }));
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn user_rejection_is_classified() {
        let provider = ScriptedProvider {
            reject_sends: true,
            ..ScriptedProvider::default()
        };
        let backend = RefetchBackend::default();
        let executor = TransactionExecutor::new(&provider, &backend);

        let err = executor
            .execute(plain_descriptor(), "0xwallet", &mut |_| {})
            .await
            .unwrap_err();

        match err {
            ExecutorError::Provider(provider_err) => {
                assert_eq!(provider_err.fault, ProviderFault::UserRejected);
                assert!(provider_err.user_message().contains("cancelled by user"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }
}
