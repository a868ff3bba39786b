use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::error::{EngineError, EngineResult};
use crate::models::Leaderboard;
use crate::services::rank_index::RankIndex;

/// A live leaderboard: its definition plus the rank index built over it.
///
/// `writer` serializes every mutation of the board, including the score
/// store round trips, so that two submissions for the same player are
/// evaluated one after the other. `index` is only write-locked for the
/// in-memory update itself; readers never wait on the store.
pub struct LeaderboardHandle {
    pub meta: Leaderboard,
    pub(crate) writer: Mutex<()>,
    pub(crate) index: RwLock<RankIndex>,
    deleted: AtomicBool,
}

impl LeaderboardHandle {
    pub(crate) fn new(meta: Leaderboard, index: RankIndex) -> Self {
        Self {
            meta,
            writer: Mutex::new(()),
            index: RwLock::new(index),
            deleted: AtomicBool::new(false),
        }
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::SeqCst);
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    /// Fails for handles obtained before the board was deleted.
    pub(crate) fn ensure_live(&self) -> EngineResult<()> {
        if self.is_deleted() {
            return Err(EngineError::leaderboard_not_found(&self.meta.id));
        }
        Ok(())
    }
}

/// Owns every leaderboard of one engine and the reverse
/// `player_id -> {leaderboard_id}` index used for per-player queries.
#[derive(Default)]
pub struct LeaderboardRegistry {
    boards: RwLock<HashMap<String, Arc<LeaderboardHandle>>>,
    player_boards: RwLock<HashMap<String, HashSet<String>>>,
}

impl LeaderboardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, leaderboard_id: &str) -> Option<Arc<LeaderboardHandle>> {
        let boards = self.boards.read().await;
        boards.get(leaderboard_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.boards.read().await.len()
    }

    /// Duplicate ids, and duplicate names within one app, are conflicts.
    pub async fn check_available(&self, id: &str, app_id: &str, name: &str) -> EngineResult<()> {
        let boards = self.boards.read().await;
        Self::conflict(&boards, id, app_id, name)
    }

    pub(crate) async fn insert(&self, handle: Arc<LeaderboardHandle>) -> EngineResult<()> {
        let mut boards = self.boards.write().await;
        Self::conflict(&boards, &handle.meta.id, &handle.meta.app_id, &handle.meta.name)?;
        boards.insert(handle.meta.id.clone(), handle);
        Ok(())
    }

    fn conflict(
        boards: &HashMap<String, Arc<LeaderboardHandle>>,
        id: &str,
        app_id: &str,
        name: &str,
    ) -> EngineResult<()> {
        if boards.contains_key(id) {
            return Err(EngineError::Conflict(format!(
                "A leaderboard with id {id} already exists"
            )));
        }
        if boards
            .values()
            .any(|b| b.meta.app_id == app_id && b.meta.name == name)
        {
            return Err(EngineError::Conflict(
                "A leaderboard with this name already exists".into(),
            ));
        }
        Ok(())
    }

    /// Unregisters `handle` if it is still the registered board for its id.
    pub(crate) async fn remove(&self, handle: &Arc<LeaderboardHandle>) -> bool {
        let mut boards = self.boards.write().await;
        match boards.get(&handle.meta.id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                boards.remove(&handle.meta.id);
                true
            }
            _ => false,
        }
    }

    pub async fn list(&self, app_id: Option<&str>) -> Vec<Leaderboard> {
        let boards = self.boards.read().await;
        let mut list: Vec<Leaderboard> = boards
            .values()
            .filter(|b| app_id.map_or(true, |app| b.meta.app_id == app))
            .map(|b| b.meta.clone())
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    pub(crate) async fn link(&self, player_id: &str, leaderboard_id: &str) {
        let mut pb = self.player_boards.write().await;
        pb.entry(player_id.to_string())
            .or_default()
            .insert(leaderboard_id.to_string());
    }

    pub(crate) async fn link_many<'a>(
        &self,
        player_ids: impl IntoIterator<Item = &'a str>,
        leaderboard_id: &str,
    ) {
        let mut pb = self.player_boards.write().await;
        for player_id in player_ids {
            pb.entry(player_id.to_string())
                .or_default()
                .insert(leaderboard_id.to_string());
        }
    }

    pub(crate) async fn unlink(&self, player_id: &str, leaderboard_id: &str) {
        let mut pb = self.player_boards.write().await;
        Self::unlink_locked(&mut pb, player_id, leaderboard_id);
    }

    pub(crate) async fn unlink_many<'a>(
        &self,
        player_ids: impl IntoIterator<Item = &'a str>,
        leaderboard_id: &str,
    ) {
        let mut pb = self.player_boards.write().await;
        for player_id in player_ids {
            Self::unlink_locked(&mut pb, player_id, leaderboard_id);
        }
    }

    fn unlink_locked(
        pb: &mut HashMap<String, HashSet<String>>,
        player_id: &str,
        leaderboard_id: &str,
    ) {
        if let Some(set) = pb.get_mut(player_id) {
            set.remove(leaderboard_id);
            if set.is_empty() {
                pb.remove(player_id);
            }
        }
    }

    /// Drops links to boards that are not registered. The registry is read
    /// under the link lock, so a board registered meanwhile keeps its links.
    pub(crate) async fn prune_unregistered(&self, player_id: &str, leaderboard_ids: &[String]) {
        let boards = self.boards.read().await;
        let mut pb = self.player_boards.write().await;
        for leaderboard_id in leaderboard_ids {
            if !boards.contains_key(leaderboard_id) {
                Self::unlink_locked(&mut pb, player_id, leaderboard_id);
            }
        }
    }

    pub async fn boards_for(&self, player_id: &str) -> Vec<String> {
        let pb = self.player_boards.read().await;
        pb.get(player_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops every board, marking outstanding handles as deleted.
    pub(crate) async fn clear(&self) -> usize {
        let mut boards = self.boards.write().await;
        let mut pb = self.player_boards.write().await;
        let count = boards.len();
        for handle in boards.values() {
            handle.mark_deleted();
        }
        boards.clear();
        pb.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SortDirection, SubmissionPolicy};
    use chrono::Utc;

    fn handle(id: &str, app: &str, name: &str) -> Arc<LeaderboardHandle> {
        let meta = Leaderboard {
            id: id.into(),
            app_id: app.into(),
            name: name.into(),
            sort_direction: SortDirection::Descending,
            submission_policy: SubmissionPolicy::BestWins,
            created_at: Utc::now(),
        };
        Arc::new(LeaderboardHandle::new(meta, RankIndex::new(SortDirection::Descending)))
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_id_and_app_scoped_name() {
        let registry = LeaderboardRegistry::new();
        registry.insert(handle("a", "app1", "Daily")).await.unwrap();

        let dup_id = registry.insert(handle("a", "app2", "Weekly")).await;
        assert!(matches!(dup_id, Err(EngineError::Conflict(_))));

        let dup_name = registry.insert(handle("b", "app1", "Daily")).await;
        assert!(matches!(dup_name, Err(EngineError::Conflict(_))));

        // Same name under another app is fine.
        registry.insert(handle("c", "app2", "Daily")).await.unwrap();
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_remove_only_unregisters_the_same_handle() {
        let registry = LeaderboardRegistry::new();
        let first = handle("a", "app", "Daily");
        registry.insert(first.clone()).await.unwrap();
        let impostor = handle("a", "app", "Daily");

        assert!(!registry.remove(&impostor).await);
        assert!(registry.remove(&first).await);
        assert!(registry.get("a").await.is_none());
    }

    #[tokio::test]
    async fn test_reverse_index_prunes_empty_sets() {
        let registry = LeaderboardRegistry::new();
        registry.link("p1", "a").await;
        registry.link_many(["p1", "p2"], "b").await;

        let mut boards = registry.boards_for("p1").await;
        boards.sort();
        assert_eq!(boards, vec!["a", "b"]);

        registry.unlink_many(["p1", "p2"], "b").await;
        registry.unlink("p1", "a").await;
        assert!(registry.boards_for("p1").await.is_empty());
        assert!(registry.player_boards.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_marks_handles_deleted() {
        let registry = LeaderboardRegistry::new();
        let h = handle("a", "app", "Daily");
        registry.insert(h.clone()).await.unwrap();
        assert_eq!(registry.clear().await, 1);
        assert!(h.is_deleted());
        assert!(matches!(h.ensure_live(), Err(EngineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_prune_keeps_links_of_registered_boards() {
        let registry = LeaderboardRegistry::new();
        registry.insert(handle("live", "app", "Daily")).await.unwrap();
        registry.link_many(["p1"], "live").await;
        registry.link_many(["p1"], "gone").await;

        registry
            .prune_unregistered("p1", &["gone".to_string(), "live".to_string()])
            .await;
        assert_eq!(registry.boards_for("p1").await, vec!["live".to_string()]);
    }
}
