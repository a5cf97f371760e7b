//! In-memory chain used by unit tests.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use starknet::{
    core::{
        types::{Felt, StarknetError},
        utils::get_selector_from_name,
    },
    providers::ProviderError,
};

use crate::{
    ContractArtifact,
    address::{UDC_ADDRESS, compute_udc_address},
    network::{
        ChainReader, ChainWriter, ClassLookup, EmittedEvent, Event, EventFilter, EventsPage,
        NetworkError, TransactionReceipt, TransactionStatus, TxState,
    },
};

#[derive(Default)]
struct State {
    declared: HashSet<Felt>,
    fail_lookups: bool,
    fail_submissions: Option<String>,
    reject_deployments: bool,
    misreported_address: Option<Felt>,
    scripted_statuses: HashMap<Felt, VecDeque<Result<TransactionStatus, NetworkError>>>,
    receipts: HashMap<Felt, TransactionReceipt>,
    status_polls: usize,
    declare_submissions: usize,
    deploy_submissions: usize,
    next_tx: u64,
    event_pages: VecDeque<EventsPage>,
    event_requests: Vec<Option<String>>,
}

/// A fake node plus signing account.
pub(crate) struct MockChain {
    account: Felt,
    state: Mutex<State>,
}

impl MockChain {
    pub(crate) const ACCOUNT: Felt = Felt::from_hex_unchecked(
        "0x127fd5f1fe78a71f8bcd1fec63e3fe2f0486b6ecd5c86a0466c3a21fa5cfcec",
    );

    pub(crate) fn new() -> Self {
        Self {
            account: Self::ACCOUNT,
            state: Mutex::new(State {
                next_tx: 0x1000,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn status(finality: TxState, execution: Option<TxState>) -> TransactionStatus {
        TransactionStatus {
            finality_status: finality,
            execution_status: execution,
        }
    }

    pub(crate) fn receipt(tx_hash: Felt, events: Vec<Event>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: tx_hash,
            finality_status: TxState::AcceptedOnL2,
            execution_status: TxState::Succeeded,
            revert_reason: None,
            events,
        }
    }

    pub(crate) fn tx_not_found() -> NetworkError {
        NetworkError::Provider(ProviderError::StarknetError(
            StarknetError::TransactionHashNotFound,
        ))
    }

    /// Any failure other than an explicit not-found answer.
    pub(crate) fn node_error() -> NetworkError {
        NetworkError::Provider(ProviderError::RateLimited)
    }

    pub(crate) fn empty_page() -> EventsPage {
        EventsPage {
            events: vec![],
            continuation_token: None,
        }
    }

    pub(crate) fn mark_declared(&self, class_hash: Felt) {
        self.state().declared.insert(class_hash);
    }

    pub(crate) fn fail_class_lookups(&self) {
        self.state().fail_lookups = true;
    }

    pub(crate) fn fail_submissions(&self, reason: &str) {
        self.state().fail_submissions = Some(reason.to_string());
    }

    pub(crate) fn reject_deployments(&self) {
        self.state().reject_deployments = true;
    }

    /// Emit `address` in the `ContractDeployed` event of later deployments.
    pub(crate) fn misreport_deployments(&self, address: Felt) {
        self.state().misreported_address = Some(address);
    }

    pub(crate) fn script_statuses(
        &self,
        tx_hash: Felt,
        statuses: Vec<Result<TransactionStatus, NetworkError>>,
    ) {
        self.state()
            .scripted_statuses
            .insert(tx_hash, statuses.into());
    }

    pub(crate) fn insert_receipt(&self, receipt: TransactionReceipt) {
        self.state()
            .receipts
            .insert(receipt.transaction_hash, receipt);
    }

    pub(crate) fn push_event_pages(&self, pages: Vec<EventsPage>) {
        self.state().event_pages.extend(pages);
    }

    pub(crate) fn status_polls(&self) -> usize {
        self.state().status_polls
    }

    pub(crate) fn declare_submissions(&self) -> usize {
        self.state().declare_submissions
    }

    pub(crate) fn deploy_submissions(&self) -> usize {
        self.state().deploy_submissions
    }

    pub(crate) fn event_requests(&self) -> Vec<Option<String>> {
        self.state().event_requests.clone()
    }

    fn next_tx(state: &mut State) -> Felt {
        state.next_tx += 1;
        Felt::from(state.next_tx)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn class_lookup(&self, class_hash: Felt) -> Result<ClassLookup, NetworkError> {
        let state = self.state();
        if state.fail_lookups {
            return Err(Self::node_error());
        }
        Ok(if state.declared.contains(&class_hash) {
            ClassLookup::Declared
        } else {
            ClassLookup::NotDeclared
        })
    }

    async fn transaction_status(&self, tx_hash: Felt) -> Result<TransactionStatus, NetworkError> {
        let mut state = self.state();
        state.status_polls += 1;

        if let Some(script) = state.scripted_statuses.get_mut(&tx_hash) {
            return script.pop_front().unwrap_or_else(|| Err(Self::tx_not_found()));
        }
        if state.receipts.contains_key(&tx_hash) {
            return Ok(Self::status(TxState::AcceptedOnL2, Some(TxState::Succeeded)));
        }
        Err(Self::tx_not_found())
    }

    async fn transaction_receipt(
        &self,
        tx_hash: Felt,
    ) -> Result<TransactionReceipt, NetworkError> {
        self.state()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(Self::tx_not_found)
    }

    async fn events_page(
        &self,
        _filter: &EventFilter,
        continuation_token: Option<&str>,
        _chunk_size: u64,
    ) -> Result<EventsPage, NetworkError> {
        let mut state = self.state();
        state.event_requests.push(continuation_token.map(String::from));
        Ok(state.event_pages.pop_front().unwrap_or_else(Self::empty_page))
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    fn account_address(&self) -> Felt {
        self.account
    }

    async fn submit_declare(&self, artifact: &ContractArtifact) -> Result<Felt, NetworkError> {
        let mut state = self.state();
        if let Some(reason) = &state.fail_submissions {
            return Err(NetworkError::Submission(reason.clone()));
        }
        state.declare_submissions += 1;
        state.declared.insert(artifact.class_hash());

        let tx_hash = Self::next_tx(&mut state);
        state.receipts.insert(tx_hash, Self::receipt(tx_hash, vec![]));
        Ok(tx_hash)
    }

    async fn submit_udc_deploy(
        &self,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
        unique: bool,
    ) -> Result<Felt, NetworkError> {
        let mut state = self.state();
        if let Some(reason) = &state.fail_submissions {
            return Err(NetworkError::Submission(reason.clone()));
        }
        state.deploy_submissions += 1;
        let tx_hash = Self::next_tx(&mut state);

        if state.reject_deployments {
            state.scripted_statuses.insert(
                tx_hash,
                VecDeque::from([Ok(TransactionStatus {
                    finality_status: TxState::Rejected,
                    execution_status: None,
                })]),
            );
            return Ok(tx_hash);
        }

        let address = state.misreported_address.unwrap_or_else(|| {
            compute_udc_address(self.account, class_hash, salt, unique, constructor_calldata)
        });
        let mut data = vec![
            address,
            self.account,
            Felt::from(unique as u64),
            class_hash,
            Felt::from(constructor_calldata.len() as u64),
        ];
        data.extend_from_slice(constructor_calldata);
        data.push(salt);

        let deployed = Event {
            from_address: UDC_ADDRESS,
            keys: vec![get_selector_from_name("ContractDeployed").unwrap()],
            data,
        };
        state.receipts.insert(tx_hash, Self::receipt(tx_hash, vec![deployed]));
        Ok(tx_hash)
    }
}

/// Events numbered `range`, one per transaction.
pub(crate) fn numbered_events(range: std::ops::Range<u64>) -> Vec<EmittedEvent> {
    range
        .map(|n| EmittedEvent {
            from_address: Felt::ONE,
            keys: vec![Felt::from(n)],
            data: vec![],
            block_hash: None,
            block_number: Some(n),
            transaction_hash: Felt::from(n),
        })
        .collect()
}
