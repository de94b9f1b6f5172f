//! Trace module interface.
use std::collections::VecDeque;

use crate::system::cp::transaction::Transaction;

/// A source of transactions.
pub trait TraceModule: Send {
    /// Prepares the trace for reading.
    fn start(&mut self) {}

    /// The next transaction, or `None` once the trace ended.
    fn next(&mut self) -> Option<Transaction>;
}

/// An implementation of [`TraceModule`] with no transactions.
#[derive(Debug, Clone, Copy)]
pub struct NopTraceModule;

impl TraceModule for NopTraceModule {
    fn next(&mut self) -> Option<Transaction> {
        None
    }
}

/// A trace held in memory.
#[derive(Debug, Clone, Default)]
pub struct QueueTraceModule {
    transactions: VecDeque<Transaction>,
}

impl QueueTraceModule {
    pub fn new(transactions: impl IntoIterator<Item = Transaction>) -> Self {
        Self {
            transactions: transactions.into_iter().collect(),
        }
    }

    /// Transactions not yet fetched.
    pub fn remaining(&self) -> usize {
        self.transactions.len()
    }
}

impl TraceModule for QueueTraceModule {
    fn start(&mut self) {
        tracing::info!(transactions = self.transactions.len(), "starting trace");
    }

    fn next(&mut self) -> Option<Transaction> {
        self.transactions.pop_front()
    }
}
