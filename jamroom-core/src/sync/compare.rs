//! Playlist offers and library comparison reports

use std::collections::BTreeSet;

use super::protocol::TrackRef;

/// A relayed playlist awaiting the user's decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistOffer {
    pub tracks: Vec<TrackRef>,
    /// Index the sender was at (not yet clamped)
    pub current_index: i64,
    /// Basenames in the offer that the local library does not have, in
    /// playlist order without repeats
    pub missing: Vec<String>,
}

impl PlaylistOffer {
    /// Build an offer, checking `tracks` against the local library's basenames
    pub fn new(tracks: Vec<TrackRef>, current_index: i64, library: &BTreeSet<String>) -> Self {
        let mut seen = BTreeSet::new();
        let missing = tracks
            .iter()
            .map(|t| t.basename())
            .filter(|name| !library.contains(*name))
            .filter(|name| seen.insert(name.to_string()))
            .map(str::to_string)
            .collect();

        Self {
            tracks,
            current_index,
            missing,
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_fully_available(&self) -> bool {
        self.missing.is_empty()
    }

    /// Confirmation text listing at most `limit` missing names
    pub fn preview(&self, limit: usize) -> String {
        let mut text = format!("Received playlist with {} songs.", self.track_count());
        if self.missing.is_empty() {
            text.push_str("\nAll songs are in your library.");
        } else {
            text.push_str(&format!(
                "\n\nMissing {} songs from your library:",
                self.missing.len()
            ));
            for name in self.missing.iter().take(limit) {
                text.push_str("\n  ");
                text.push_str(name);
            }
            if self.missing.len() > limit {
                text.push_str(&format!("\n  ... and {} more", self.missing.len() - limit));
            }
        }
        text.push_str("\n\nReplace your current playlist?");
        text
    }
}

/// Result of comparing a peer's library against ours (by basename)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryReport {
    pub local_count: usize,
    /// Count the peer reported; can exceed the number of distinct names
    /// when its library repeats a basename
    pub remote_count: usize,
    pub common: usize,
    /// Names only we have, sorted
    pub only_local: Vec<String>,
    /// Names only the peer has, sorted
    pub only_remote: Vec<String>,
    /// Whether the peer sent this as an answer
    pub is_reply: bool,
}

impl LibraryReport {
    pub fn compare(
        local: &BTreeSet<String>,
        remote: &BTreeSet<String>,
        remote_count: usize,
        is_reply: bool,
    ) -> Self {
        Self {
            local_count: local.len(),
            remote_count,
            common: local.intersection(remote).count(),
            only_local: local.difference(remote).cloned().collect(),
            only_remote: remote.difference(local).cloned().collect(),
            is_reply,
        }
    }

    /// Both sides hold exactly the same names; this is our own snapshot
    /// coming back through the relay
    pub fn is_self_echo(&self) -> bool {
        self.only_local.is_empty() && self.only_remote.is_empty()
    }

    /// Share of our library the peer also has, as a whole percentage
    pub fn local_percent(&self) -> usize {
        self.common * 100 / self.local_count.max(1)
    }

    /// Share of the peer's library we also have
    pub fn remote_percent(&self) -> usize {
        self.common * 100 / self.remote_count.max(1)
    }

    /// Human-readable summary with at most `limit` sample names per side
    pub fn summary(&self, limit: usize) -> String {
        let mut text = format!(
            "Your library: {} songs\nTheir library: {} songs\nIn common: {} songs\n\
             That's {}% of your library and {}% of theirs",
            self.local_count,
            self.remote_count,
            self.common,
            self.local_percent(),
            self.remote_percent(),
        );
        push_sample(&mut text, "Only you have", &self.only_local, limit);
        push_sample(&mut text, "Only they have", &self.only_remote, limit);
        text
    }
}

fn push_sample(text: &mut String, heading: &str, names: &[String], limit: usize) {
    if names.is_empty() {
        return;
    }
    text.push_str(&format!("\n\n{} ({}):", heading, names.len()));
    for name in names.iter().take(limit) {
        text.push_str("\n  ");
        text.push_str(name);
    }
    if names.len() > limit {
        text.push_str(&format!("\n  ... and {} more", names.len() - limit));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_offer_lists_missing_basenames_once() {
        let library = names(&["a.mp3", "b.mp3"]);
        let offer = PlaylistOffer::new(
            vec![
                "/remote/a.mp3".into(),
                "C:\\music\\c.mp3".into(),
                "/other/c.mp3".into(),
                "/x/d.mp3".into(),
            ],
            1,
            &library,
        );
        assert_eq!(offer.track_count(), 4);
        assert_eq!(offer.missing, vec!["c.mp3", "d.mp3"]);
        assert!(!offer.is_fully_available());
    }

    #[test]
    fn test_offer_preview_is_bounded() {
        let tracks: Vec<TrackRef> = (0..13).map(|i| TrackRef::new(format!("/m/{i}.mp3"))).collect();
        let offer = PlaylistOffer::new(tracks, 0, &BTreeSet::new());
        let preview = offer.preview(10);
        assert!(preview.contains("Missing 13 songs"));
        assert!(preview.contains("9.mp3"));
        assert!(!preview.contains("\n  12.mp3"));
        assert!(preview.contains("... and 3 more"));
    }

    #[test]
    fn test_report_counts_and_percentages() {
        let local = names(&["a", "b", "c", "d"]);
        let remote = names(&["c", "d", "e"]);
        let report = LibraryReport::compare(&local, &remote, 3, false);

        assert_eq!(report.common, 2);
        assert_eq!(report.only_local, vec!["a", "b"]);
        assert_eq!(report.only_remote, vec!["e"]);
        assert_eq!(report.local_percent(), 50);
        assert_eq!(report.remote_percent(), 66);
        assert!(!report.is_self_echo());

        let summary = report.summary(8);
        assert!(summary.contains("In common: 2 songs"));
        assert!(summary.contains("Only they have (1):"));
    }

    #[test]
    fn test_identical_libraries_are_self_echo() {
        let library = names(&["a", "b"]);
        let report = LibraryReport::compare(&library, &library.clone(), 2, true);
        assert!(report.is_self_echo());

        let empty = LibraryReport::compare(&BTreeSet::new(), &BTreeSet::new(), 0, false);
        assert!(empty.is_self_echo());
        assert_eq!(empty.local_percent(), 0);
    }
}
