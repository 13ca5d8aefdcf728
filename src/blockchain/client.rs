// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Meridian Financial

//! EVM RPC client with treasury signing.

use std::str::FromStr;

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, Bytes},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::{env_optional, env_or_default};

use super::erc20::{format_units, to_base_units, IERC20};
use super::gateway::{ChainError, ChainGateway, TokenBalance, TokenTransfer, TransferOutcome};

/// HTTP provider type with gas/nonce/chain-id fillers and treasury signing.
type SignedProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// Chain client backed by a single treasury key.
///
/// All outbound transfers are signed by the treasury; users never hold keys
/// on this side.
pub struct EvmChainClient {
    provider: SignedProvider,
    token: Address,
    token_symbol: String,
    token_decimals: u8,
    native_symbol: String,
}

impl EvmChainClient {
    /// Build the client from environment configuration.
    ///
    /// Required: `CHAIN_RPC_URL`, `TREASURY_PRIVATE_KEY`, `SWAP_TOKEN_ADDRESS`.
    /// Optional: `SWAP_TOKEN_SYMBOL` (default `BTC`), `SWAP_TOKEN_DECIMALS`
    /// (default `8`), `CHAIN_NATIVE_SYMBOL` (default `ETH`).
    pub fn from_env() -> Result<Self, ChainError> {
        let rpc_url = env_optional("CHAIN_RPC_URL")
            .ok_or_else(|| ChainError::Rpc("CHAIN_RPC_URL is not set".to_string()))?;
        let private_key = env_optional("TREASURY_PRIVATE_KEY")
            .ok_or_else(|| ChainError::Rpc("TREASURY_PRIVATE_KEY is not set".to_string()))?;
        let token_address = env_optional("SWAP_TOKEN_ADDRESS")
            .ok_or_else(|| ChainError::Rpc("SWAP_TOKEN_ADDRESS is not set".to_string()))?;
        let token_symbol = env_or_default("SWAP_TOKEN_SYMBOL", "BTC");
        let token_decimals: u8 = env_or_default("SWAP_TOKEN_DECIMALS", "8")
            .parse()
            .map_err(|_| ChainError::Rpc("SWAP_TOKEN_DECIMALS must be an integer".to_string()))?;
        let native_symbol = env_or_default("CHAIN_NATIVE_SYMBOL", "ETH");

        let signer = parse_signer(&private_key)?;
        Self::new(
            &rpc_url,
            signer,
            &token_address,
            token_symbol,
            token_decimals,
            native_symbol,
        )
    }

    pub fn new(
        rpc_url: &str,
        signer: PrivateKeySigner,
        token_address: &str,
        token_symbol: String,
        token_decimals: u8,
        native_symbol: String,
    ) -> Result<Self, ChainError> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| ChainError::Rpc(format!("invalid RPC URL: {e}")))?;
        let token = Address::from_str(token_address)
            .map_err(|e| ChainError::InvalidAddress(format!("invalid token address: {e}")))?;

        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

        Ok(Self {
            provider,
            token,
            token_symbol,
            token_decimals,
            native_symbol,
        })
    }

    fn parse_address(&self, address: &str) -> Result<Address, ChainError> {
        Address::from_str(address).map_err(|e| ChainError::InvalidAddress(e.to_string()))
    }
}

/// Parse a hex private key, with or without the 0x prefix.
fn parse_signer(private_key_hex: &str) -> Result<PrivateKeySigner, ChainError> {
    let stripped = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
    let key_bytes = alloy::hex::decode(stripped)
        .map_err(|e| ChainError::Rpc(format!("invalid treasury key: {e}")))?;
    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| ChainError::Rpc(format!("invalid treasury key: {e}")))
}

#[async_trait]
impl ChainGateway for EvmChainClient {
    async fn native_balance(&self, address: &str) -> Result<TokenBalance, ChainError> {
        let addr = self.parse_address(address)?;
        let balance = self
            .provider
            .get_balance(addr)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        Ok(TokenBalance {
            symbol: self.native_symbol.clone(),
            balance_raw: balance.to_string(),
            balance_formatted: format_units(balance, 18),
            decimals: 18,
            contract_address: None,
        })
    }

    async fn token_balance(&self, address: &str) -> Result<TokenBalance, ChainError> {
        let addr = self.parse_address(address)?;
        let contract = IERC20::new(self.token, &self.provider);
        let balance = contract
            .balanceOf(addr)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))?;

        Ok(TokenBalance {
            symbol: self.token_symbol.clone(),
            balance_raw: balance.to_string(),
            balance_formatted: format_units(balance, self.token_decimals),
            decimals: self.token_decimals,
            contract_address: Some(format!("{:?}", self.token)),
        })
    }

    async fn transfer_token(
        &self,
        to: &str,
        quantity: Decimal,
    ) -> Result<TransferOutcome, ChainError> {
        let to_addr = self.parse_address(to)?;
        let amount = to_base_units(quantity, self.token_decimals)?;

        let call = IERC20::transferCall {
            to: to_addr,
            amount,
        };
        let tx = TransactionRequest::default()
            .to(self.token)
            .input(Bytes::from(call.abi_encode()).into());

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::TransactionFailed(e.to_string()))?;

        Ok(TransferOutcome {
            tx_hash: format!("{:?}", pending.tx_hash()),
            status: "submitted".to_string(),
        })
    }

    async fn token_transfer_logs(
        &self,
        address: &str,
        from_block: Option<u64>,
    ) -> Result<Vec<TokenTransfer>, ChainError> {
        let addr = self.parse_address(address)?;
        let contract = IERC20::new(self.token, &self.provider);
        let start = from_block.unwrap_or(0);

        let sent = contract
            .Transfer_filter()
            .topic1(addr)
            .from_block(start)
            .query()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;
        let received = contract
            .Transfer_filter()
            .topic2(addr)
            .from_block(start)
            .query()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        let mut transfers: Vec<TokenTransfer> = sent
            .into_iter()
            .chain(received)
            .map(|(event, log)| TokenTransfer {
                tx_hash: log
                    .transaction_hash
                    .map(|h| format!("{h:?}"))
                    .unwrap_or_default(),
                from: format!("{:?}", event.from),
                to: format!("{:?}", event.to),
                quantity: format_units(event.value, self.token_decimals),
                block_number: log.block_number.unwrap_or(0),
            })
            .collect();

        // Self-transfers appear in both queries
        transfers.sort_by(|a, b| b.block_number.cmp(&a.block_number));
        transfers.dedup_by(|a, b| a.tx_hash == b.tx_hash && a.from == b.from && a.to == b.to);
        Ok(transfers)
    }
}
