//! Surrogate keys for the songplays fact table
//!
//! Keys are handed out in the order rows are presented. To make keys
//! reproducible across reruns the pipeline always sorts drafts with
//! [`order_songplays`] before assignment.

use crate::mapper::{SongplayDraft, SongplayRecord};

/// First key of a run unless configured otherwise
pub const DEFAULT_KEY_BASE: i64 = 0;

/// Sort drafts into key-assignment order
///
/// Order: start_time, session_id, item_in_session, user_id, song title,
/// artist name, all ascending with nulls first. The sort is stable.
pub fn order_songplays(drafts: &mut [SongplayDraft]) {
    drafts.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.session_id.cmp(&b.session_id))
            .then_with(|| a.item_in_session.cmp(&b.item_in_session))
            .then_with(|| a.user_id.cmp(&b.user_id))
            .then_with(|| a.song_title.cmp(&b.song_title))
            .then_with(|| a.artist_name.cmp(&b.artist_name))
    });
}

/// Hands out consecutive songplay ids for one run
#[derive(Debug, Clone)]
pub struct SurrogateKeyAssigner {
    base: i64,
    next: i64,
}

impl Default for SurrogateKeyAssigner {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_BASE)
    }
}

impl SurrogateKeyAssigner {
    /// Create an assigner whose first key is `base`
    pub fn new(base: i64) -> Self {
        Self { base, next: base }
    }

    /// Assign keys to drafts in the order given
    ///
    /// The counter carries over between calls, so keys stay unique when a
    /// run loads several batches.
    pub fn assign(&mut self, drafts: Vec<SongplayDraft>) -> Vec<SongplayRecord> {
        drafts
            .into_iter()
            .map(|draft| {
                let id = self.next;
                self.next += 1;
                SongplayRecord::from_draft(id, draft)
            })
            .collect()
    }

    /// Number of keys handed out so far
    pub fn assigned(&self) -> u64 {
        (self.next - self.base).unsigned_abs()
    }

    /// The key the next row will receive
    pub fn peek(&self) -> i64 {
        self.next
    }
}
