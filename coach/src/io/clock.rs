//! Identity and timestamps for new artifacts.

use chrono::{Local, Utc};
use rand::{Rng, distributions::Alphanumeric};

use crate::core::artifact::ArtifactStamp;

/// Stamp a new artifact with a fresh id and the current local time.
///
/// Ids are `{unix millis}-{6 random lowercase alphanumerics}`, so two stamps
/// taken in the same millisecond still differ.
pub fn new_stamp() -> ArtifactStamp {
    ArtifactStamp {
        id: format!("{}-{}", Utc::now().timestamp_millis(), generate_short_id()),
        created_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn stamps_do_not_collide() {
        let ids: HashSet<String> = (0..200).map(|_| new_stamp().id).collect();
        assert_eq!(ids.len(), 200);
    }
}
