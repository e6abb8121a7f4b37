use std::collections::HashMap;

/// Identifies one fetch issued for a filter row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub index: usize,
    pub generation: u64,
}

/// Per-row fetch generation counters.
///
/// Every new fetch for a row bumps its generation; a response whose ticket no
/// longer matches the live generation is stale and must be dropped.
#[derive(Debug, Default)]
pub struct FetchGenerations {
    live: HashMap<usize, u64>,
}

impl FetchGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, index: usize) -> FetchTicket {
        let generation = self.live.entry(index).or_insert(0);
        *generation += 1;
        FetchTicket {
            index,
            generation: *generation,
        }
    }

    /// Ticket for the live generation, without superseding anything.
    pub fn current(&self, index: usize) -> FetchTicket {
        FetchTicket {
            index,
            generation: self.live.get(&index).copied().unwrap_or(0),
        }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.live.get(&ticket.index).copied().unwrap_or(0) == ticket.generation
    }

    /// Supersedes all outstanding fetches for rows at or after `index`.
    /// Used when removing a row shifts the rows behind it.
    pub fn retire_from(&mut self, index: usize) {
        for (row, generation) in self.live.iter_mut() {
            if *row >= index {
                *generation += 1;
            }
        }
    }

    pub fn retire_all(&mut self) {
        self.retire_from(0);
    }
}
