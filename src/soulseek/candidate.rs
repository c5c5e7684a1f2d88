use std::collections::HashMap;

use crate::soulseek::listing::NormalizedListing;

/// Every listing one peer shares from one folder.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingGroup {
    pub peer_id: String,
    pub folder_name: String,
    pub listings: Vec<NormalizedListing>,
}

impl ListingGroup {
    pub fn key(&self) -> String {
        group_key(&self.peer_id, &self.folder_name)
    }

    pub fn has_open_slot(&self) -> bool {
        self.listings.iter().any(|l| l.listing.has_open_slot)
    }

    /// Mean advertised speed over the listings that report one.
    pub fn average_speed_kbps(&self) -> Option<f64> {
        let speeds: Vec<u32> = self
            .listings
            .iter()
            .filter_map(|l| l.listing.link_speed_kbps)
            .collect();
        if speeds.is_empty() {
            return None;
        }
        Some(speeds.iter().map(|&s| s as f64).sum::<f64>() / speeds.len() as f64)
    }

    pub fn audio_listings(&self) -> impl Iterator<Item = &NormalizedListing> {
        self.listings.iter().filter(|l| l.is_audio())
    }
}

pub fn group_key(peer_id: &str, folder_name: &str) -> String {
    format!("{}::{}", peer_id, folder_name)
}

/// Groups listings by peer and parent folder.
///
/// Groups come out in the order their first listing was seen, and listings keep
/// their input order inside a group.
pub fn group_listings(listings: Vec<NormalizedListing>) -> Vec<ListingGroup> {
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<ListingGroup> = Vec::new();

    for listing in listings {
        let key = group_key(&listing.listing.peer_id, &listing.folder_name);
        match index_by_key.get(&key) {
            Some(&index) => groups[index].listings.push(listing),
            None => {
                index_by_key.insert(key, groups.len());
                groups.push(ListingGroup {
                    peer_id: listing.listing.peer_id.clone(),
                    folder_name: listing.folder_name.clone(),
                    listings: vec![listing],
                });
            }
        }
    }

    log::debug!("Grouped listings into {} peer folders", groups.len());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soulseek::listing::normalize_listing;
    use crate::soulseek::types::FileListing;

    fn listing(path: &str, peer: &str, speed: Option<u32>, slot: bool) -> NormalizedListing {
        normalize_listing(&FileListing {
            link_speed_kbps: speed,
            has_open_slot: slot,
            ..FileListing::new(path, peer)
        })
    }

    #[test]
    fn test_group_by_peer_and_folder() {
        let groups = group_listings(vec![
            listing("p\\Album A\\01.mp3", "alice", None, false),
            listing("p\\Album B\\01.mp3", "alice", None, false),
            listing("p\\Album A\\02.mp3", "bob", None, false),
            listing("q\\album a\\02.mp3", "alice", None, false),
        ]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key(), "alice::album a");
        assert_eq!(groups[0].listings.len(), 2);
        assert_eq!(groups[0].listings[0].file_name, "01.mp3");
        assert_eq!(groups[0].listings[1].file_name, "02.mp3");
        assert_eq!(groups[1].key(), "alice::album b");
        assert_eq!(groups[2].key(), "bob::album a");
    }

    #[test]
    fn test_group_empty_input() {
        assert!(group_listings(vec![]).is_empty());
    }

    #[test]
    fn test_group_slot_and_speed_aggregates() {
        let groups = group_listings(vec![
            listing("x\\f\\1.mp3", "p", Some(1000), false),
            listing("x\\f\\2.mp3", "p", Some(3000), true),
            listing("x\\f\\3.mp3", "p", None, false),
        ]);
        let group = &groups[0];
        assert!(group.has_open_slot());
        assert_eq!(group.average_speed_kbps(), Some(2000.0));

        let no_speed = group_listings(vec![listing("x\\f\\1.mp3", "p", None, false)]);
        assert_eq!(no_speed[0].average_speed_kbps(), None);
        assert!(!no_speed[0].has_open_slot());
    }

    #[test]
    fn test_audio_listings_filter() {
        let groups = group_listings(vec![
            listing("x\\f\\1.flac", "p", None, false),
            listing("x\\f\\cover.jpg", "p", None, false),
        ]);
        assert_eq!(groups[0].audio_listings().count(), 1);
    }
}
