//! Pairing of a day's turns into exchanges.
//!
//! An exchange is a user turn plus the assistant turn right after it, if any.
//! Exchanges exist only for display and deletion; they are recomputed from the
//! turn sequence whenever needed.

use crate::types::ChatTurn;

/// Positions of an exchange's turns within one day's bucket.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Index of the opening turn.
    pub first: usize,
    /// Index of the reply, when the opening turn was answered.
    pub second: Option<usize>,
}

impl Exchange {
    /// The bucket indices covered by this exchange, in order.
    pub fn indices(&self) -> Vec<usize> {
        std::iter::once(self.first).chain(self.second).collect()
    }

    /// Borrow this exchange's turns out of the bucket it was computed from.
    pub fn turns<'a>(&self, turns: &'a [ChatTurn]) -> Vec<&'a ChatTurn> {
        self.indices()
            .into_iter()
            .filter_map(|idx| turns.get(idx))
            .collect()
    }
}

/// Scan `turns` left to right and pair them into exchanges.
///
/// A user turn takes the immediately following turn as its reply when that
/// turn is an assistant turn.  A turn that is not a user turn at the cursor
/// stands alone; this covers legacy files with unanswered or orphaned replies.
pub fn pair_exchanges(turns: &[ChatTurn]) -> Vec<Exchange> {
    let mut exchanges = Vec::new();
    let mut cursor = 0;
    while cursor < turns.len() {
        let first = cursor;
        cursor += 1;
        let mut second = None;
        if turns[first].speaker.is_user()
            && turns
                .get(cursor)
                .is_some_and(|next| next.speaker.is_assistant())
        {
            second = Some(cursor);
            cursor += 1;
        }
        exchanges.push(Exchange { first, second });
    }
    exchanges
}

/// Remove the turns at `indices` from `turns`, keeping the rest in order.
///
/// Indices out of range are ignored.  Returns the removed turns.
pub fn remove_indices(turns: &mut Vec<ChatTurn>, indices: &[usize]) -> Vec<ChatTurn> {
    let mut removed = Vec::new();
    let mut kept = Vec::with_capacity(turns.len());
    for (idx, turn) in turns.drain(..).enumerate() {
        if indices.contains(&idx) {
            removed.push(turn);
        } else {
            kept.push(turn);
        }
    }
    *turns = kept;
    removed
}
