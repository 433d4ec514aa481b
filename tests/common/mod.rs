//! Shared fakes for the integration suites: a scripted command backend and a
//! scripted wallet provider.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use swapsmith::api::{
    AgentType, CommandBackend, CommandReply, CommandRequest, Quote, QuoteSheet, ResponseBody,
    StructuredContent, TokenInfo, TransactionDescriptor,
};
use swapsmith::error::{ApiError, ProviderError};
use swapsmith::executor::{
    ReceiptStatus, TransactionReceipt, TransactionRequest, WalletProvider,
};

pub fn eth() -> TokenInfo {
    TokenInfo {
        address: Some("0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".to_string()),
        symbol: "ETH".to_string(),
        name: Some("Ether".to_string()),
        metadata: None,
    }
}

pub fn usdc() -> TokenInfo {
    TokenInfo {
        address: Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string()),
        symbol: "USDC".to_string(),
        name: Some("USD Coin".to_string()),
        metadata: None,
    }
}

pub fn swap_confirmation_reply() -> CommandReply {
    CommandReply {
        content: Some(ResponseBody::Structured(
            StructuredContent::SwapConfirmation {
                amount: dec!(0.1),
                amount_is_usd: false,
                token_in: eth(),
                token_out: usdc(),
            },
        )),
        agent_type: Some(AgentType::Swap),
        ..CommandReply::default()
    }
}

pub fn kyber_quote() -> Quote {
    Quote {
        protocol: "kyber".to_string(),
        sell_amount: "100000000000000000".to_string(),
        buy_amount: "250000000".to_string(),
        gas: Some("210000".to_string()),
        gas_usd: None,
    }
}

pub fn quote_sheet() -> QuoteSheet {
    QuoteSheet {
        quotes: vec![kyber_quote()],
        token_out: Some(usdc()),
        is_brian_operation: false,
        error: None,
    }
}

pub fn plain_descriptor() -> TransactionDescriptor {
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
        agent_type: Some(AgentType::Swap),
        metadata: None,
    }
}

pub fn approval_descriptor() -> TransactionDescriptor {
    TransactionDescriptor {
        needs_approval: true,
        token_to_approve: Some("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913".to_string()),
        spender: Some("0x6131B5fae19EA4f9D964eAc0408E4408b66337b5".to_string()),
        pending_command: Some("approved:swap 0.1 ETH for USDC".to_string()),
        ..plain_descriptor()
    }
}

/// Scripted backend that records every call it receives.
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    pub general_reply: Mutex<CommandReply>,
    pub swap_reply: Mutex<CommandReply>,
    pub dca_reply: Mutex<CommandReply>,
    pub quotes: Mutex<QuoteSheet>,
    pub swap_descriptor: Mutex<TransactionDescriptor>,
    pub prepared_descriptor: Mutex<TransactionDescriptor>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            general_reply: Mutex::new(CommandReply {
                content: Some(ResponseBody::text("ok")),
                ..CommandReply::default()
            }),
            swap_reply: Mutex::new(swap_confirmation_reply()),
            dca_reply: Mutex::new(CommandReply {
                content: Some(ResponseBody::text("DCA scheduled")),
                agent_type: Some(AgentType::Dca),
                ..CommandReply::default()
            }),
            quotes: Mutex::new(quote_sheet()),
            swap_descriptor: Mutex::new(plain_descriptor()),
            prepared_descriptor: Mutex::new(plain_descriptor()),
        }
    }
}

impl FakeBackend {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_general_reply(&self, reply: CommandReply) {
        *self.general_reply.lock().unwrap() = reply;
    }

    pub fn set_quotes(&self, sheet: QuoteSheet) {
        *self.quotes.lock().unwrap() = sheet;
    }

    pub fn set_swap_descriptor(&self, descriptor: TransactionDescriptor) {
        *self.swap_descriptor.lock().unwrap() = descriptor;
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CommandBackend for FakeBackend {
    async fn process_command(&self, request: &CommandRequest) -> Result<CommandReply, ApiError> {
        self.record(format!("process:{}", request.content));
        Ok(self.general_reply.lock().unwrap().clone())
    }

    async fn process_swap_command(
        &self,
        request: &CommandRequest,
    ) -> Result<CommandReply, ApiError> {
        self.record(format!("process_swap:{}", request.content));
        Ok(self.swap_reply.lock().unwrap().clone())
    }

    async fn process_dca_command(
        &self,
        request: &CommandRequest,
    ) -> Result<CommandReply, ApiError> {
        self.record(format!("process_dca:{}", request.content));
        Ok(self.dca_reply.lock().unwrap().clone())
    }

    async fn get_swap_quotes(
        &self,
        _wallet_address: &str,
        chain_id: u64,
    ) -> Result<QuoteSheet, ApiError> {
        self.record(format!("quotes:{chain_id}"));
        Ok(self.quotes.lock().unwrap().clone())
    }

    async fn execute_swap(
        &self,
        _wallet_address: &str,
        _chain_id: u64,
        quote: &Quote,
    ) -> Result<TransactionDescriptor, ApiError> {
        self.record(format!("execute_swap:{}", quote.protocol));
        Ok(self.swap_descriptor.lock().unwrap().clone())
    }

    async fn prepare_transaction(
        &self,
        command: &str,
        _wallet_address: &str,
        _chain_id: u64,
        skip_approval: bool,
    ) -> Result<TransactionDescriptor, ApiError> {
        self.record(format!("prepare:{command}:skip={skip_approval}"));
        Ok(self.prepared_descriptor.lock().unwrap().clone())
    }
}

/// Scripted provider that records submissions and receipt waits in order.
/// Receipts for transactions sent to `0xrouter` revert when
/// `revert_router_receipt` is set; approval receipts always succeed.
#[derive(Default)]
pub struct FakeProvider {
    pub calls: Mutex<Vec<String>>,
    pub sends: Mutex<Vec<(String, String)>>,
    pub reject_sends: bool,
    pub revert_router_receipt: bool,
}

impl FakeProvider {
    pub fn rejecting() -> Self {
        Self {
            reject_sends: true,
            ..Self::default()
        }
    }

    pub fn reverting() -> Self {
        Self {
            revert_router_receipt: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletProvider for FakeProvider {
    async fn send_transaction(&self, request: &TransactionRequest) -> Result<String, ProviderError> {
        if self.reject_sends {
            return Err(ProviderError::from_message(
                "MetaMask Tx Signature: User denied transaction signature.",
            ));
        }
        let mut sends = self.sends.lock().unwrap();
        let tx_hash = format!("0xtx{}", sends.len() + 1);
        sends.push((tx_hash.clone(), request.to.clone()));
        self.calls.lock().unwrap().push(format!("send:{}", request.to));
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, ProviderError> {
        self.calls.lock().unwrap().push(format!("receipt:{tx_hash}"));
        let sent_to = self
            .sends
            .lock()
            .unwrap()
            .iter()
            .find(|(hash, _)| hash == tx_hash)
            .map(|(_, to)| to.clone())
            .unwrap_or_default();
        let status = if self.revert_router_receipt && sent_to == "0xrouter" {
            ReceiptStatus::Reverted
        } else {
            ReceiptStatus::Success
        };
        Ok(TransactionReceipt {
            transaction_hash: tx_hash.to_string(),
            status,
            block_number: Some(7),
        })
    }

    async fn active_chain_id(&self) -> Result<u64, ProviderError> {
        Ok(8453)
    }
}
