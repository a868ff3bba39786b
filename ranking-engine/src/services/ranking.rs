//! Ranking engine: submission policy and ranked queries over the registry.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::LeaderboardConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::*;
use crate::services::rank_index::RankIndex;
use crate::services::registry::{LeaderboardHandle, LeaderboardRegistry};
use crate::store::ScoreStore;

const MAX_ID_LEN: usize = 128;

fn validate_id(kind: &str, id: &str) -> EngineResult<()> {
    if id.is_empty() {
        return Err(EngineError::InvalidInput(format!("{kind} is required")));
    }
    if id.chars().count() > MAX_ID_LEN {
        return Err(EngineError::InvalidInput(format!(
            "{kind} must be at most {MAX_ID_LEN} characters"
        )));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(EngineError::InvalidInput(format!(
            "{kind} must not contain whitespace or control characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> EngineResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput("Leaderboard name is required".into()));
    }
    if trimmed.chars().count() > MAX_ID_LEN || trimmed.chars().any(char::is_control) {
        return Err(EngineError::InvalidInput("Leaderboard name is malformed".into()));
    }
    Ok(())
}

pub struct RankingEngine<S> {
    store: S,
    registry: LeaderboardRegistry,
    limits: LeaderboardConfig,
}

impl<S: ScoreStore> RankingEngine<S> {
    pub fn new(store: S, limits: LeaderboardConfig) -> Self {
        Self {
            store,
            registry: LeaderboardRegistry::new(),
            limits,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn limits(&self) -> &LeaderboardConfig {
        &self.limits
    }

    fn check_value(&self, value: ScoreValue) -> EngineResult<()> {
        let v = value.get();
        if v < self.limits.score_min || v > self.limits.score_max {
            return Err(EngineError::InvalidInput(format!(
                "Score must be between {} and {}",
                self.limits.score_min, self.limits.score_max
            )));
        }
        Ok(())
    }

    async fn handle(&self, leaderboard_id: &str) -> EngineResult<Arc<LeaderboardHandle>> {
        validate_id("leaderboard_id", leaderboard_id)?;
        let handle = self
            .registry
            .get(leaderboard_id)
            .await
            .ok_or_else(|| EngineError::leaderboard_not_found(leaderboard_id))?;
        handle.ensure_live()?;
        Ok(handle)
    }

    /// Registers a leaderboard and hydrates its rank index from the store.
    pub async fn create_leaderboard(&self, new: NewLeaderboard) -> EngineResult<Leaderboard> {
        validate_id("app_id", &new.app_id)?;
        validate_name(&new.name)?;
        let id = match new.id {
            Some(id) => {
                validate_id("leaderboard_id", &id)?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        let name = new.name.trim().to_string();
        self.registry.check_available(&id, &new.app_id, &name).await?;

        let entries = self.store.load_all(&id).await?;
        let index = RankIndex::from_entries(new.sort_direction, entries);
        let meta = Leaderboard {
            id,
            app_id: new.app_id,
            name,
            sort_direction: new.sort_direction,
            submission_policy: new.submission_policy,
            created_at: Utc::now(),
        };

        let handle = Arc::new(LeaderboardHandle::new(meta.clone(), index));
        // Held until the reverse index knows about the hydrated players so a
        // racing delete cannot leave stale links behind.
        let _gate = handle.writer.lock().await;
        self.registry.insert(handle.clone()).await?;
        let hydrated = {
            let index = handle.index.read().await;
            let players: Vec<&str> = index.player_ids().collect();
            self.registry.link_many(players.iter().copied(), &meta.id).await;
            index.len()
        };

        tracing::info!(
            leaderboard_id = %meta.id,
            app_id = %meta.app_id,
            sort_direction = %meta.sort_direction,
            hydrated,
            "Leaderboard created"
        );
        Ok(meta)
    }

    pub async fn get_leaderboard(&self, leaderboard_id: &str) -> EngineResult<Leaderboard> {
        Ok(self.handle(leaderboard_id).await?.meta.clone())
    }

    pub async fn list_leaderboards(&self, app_id: &str) -> EngineResult<Vec<Leaderboard>> {
        validate_id("app_id", app_id)?;
        Ok(self.registry.list(Some(app_id)).await)
    }

    /// Applies the board's submission policy. A submission that does not
    /// replace the active entry is a success with `changed == false`.
    pub async fn submit_score(&self, submission: ScoreSubmission) -> EngineResult<SubmitOutcome> {
        validate_id("player_id", &submission.player_id)?;
        let handle = self.handle(&submission.leaderboard_id).await?;
        self.check_value(submission.value)?;
        let meta = &handle.meta;

        let _gate = handle.writer.lock().await;
        handle.ensure_live()?;

        let current = self
            .store
            .get(&meta.id, &submission.player_id)
            .await?;

        if let Some(active) = &current {
            let replaces = match meta.submission_policy {
                SubmissionPolicy::BestWins => {
                    meta.sort_direction.improves(submission.value, active.value)
                }
                SubmissionPolicy::LatestWins => true,
            };
            if !replaces {
                let active = active.clone();
                let rank = self.rank_or_repair(&handle, &active).await;
                tracing::debug!(
                    leaderboard_id = %meta.id,
                    player_id = %active.player_id,
                    rank,
                    submitted = %submission.value,
                    active = %active.value,
                    "Score did not improve, keeping active entry"
                );
                return Ok(SubmitOutcome {
                    leaderboard_id: meta.id.clone(),
                    player_id: active.player_id.clone(),
                    rank,
                    changed: false,
                    previous: Some(active.value),
                    active,
                });
            }
        }

        // Only writers bump the sequence and they hold the gate.
        let sequence = handle.index.read().await.next_sequence();
        let entry = submission.into_entry(sequence);
        self.store.put(&entry).await?;
        let rank = handle.index.write().await.insert_entry(&entry);
        self.registry.link(&entry.player_id, &meta.id).await;

        tracing::info!(
            leaderboard_id = %meta.id,
            player_id = %entry.player_id,
            value = %entry.value,
            rank,
            "Score applied"
        );
        Ok(SubmitOutcome {
            leaderboard_id: meta.id.clone(),
            player_id: entry.player_id.clone(),
            rank,
            changed: true,
            previous: current.map(|c| c.value),
            active: entry,
        })
    }

    /// Rank of a stored entry, re-inserting it if the index has drifted.
    async fn rank_or_repair(&self, handle: &LeaderboardHandle, active: &ScoreEntry) -> usize {
        if let Some(rank) = handle.index.read().await.rank_of(&active.player_id) {
            return rank;
        }
        tracing::warn!(
            leaderboard_id = %handle.meta.id,
            player_id = %active.player_id,
            "Stored score missing from rank index, repairing"
        );
        let rank = handle.index.write().await.insert_entry(active);
        self.registry.link(&active.player_id, &handle.meta.id).await;
        rank
    }

    /// Up to `k` leading entries; `k <= 0` yields an empty list.
    pub async fn get_top(&self, leaderboard_id: &str, k: i64) -> EngineResult<TopScores> {
        let handle = self.handle(leaderboard_id).await?;
        let index = handle.index.read().await;
        handle.ensure_live()?;

        let entries = if k <= 0 {
            Vec::new()
        } else {
            let k = usize::try_from(k).unwrap_or(usize::MAX).min(self.limits.max_top);
            index.top_k(k)
        };
        Ok(TopScores {
            leaderboard: handle.meta.clone(),
            total: index.len(),
            entries,
        })
    }

    /// [`Self::get_top`] with the configured default `k`.
    pub async fn get_top_default(&self, leaderboard_id: &str) -> EngineResult<TopScores> {
        self.get_top(leaderboard_id, self.limits.default_top).await
    }

    /// The player's rank with up to `window` neighbors on each side.
    pub async fn get_player_rank(
        &self,
        leaderboard_id: &str,
        player_id: &str,
        window: i64,
    ) -> EngineResult<PlayerStanding> {
        validate_id("player_id", player_id)?;
        if window < 0 {
            return Err(EngineError::InvalidInput(
                "window must not be negative".into(),
            ));
        }
        let window = usize::try_from(window)
            .unwrap_or(usize::MAX)
            .min(self.limits.max_window);

        let handle = self.handle(leaderboard_id).await?;
        let index = handle.index.read().await;
        handle.ensure_live()?;

        let entry = index
            .entry(player_id)
            .ok_or_else(|| EngineError::not_ranked(leaderboard_id, player_id))?;
        let nearby = index.around(player_id, window).unwrap_or_default();
        Ok(PlayerStanding {
            leaderboard_id: handle.meta.id.clone(),
            player_id: player_id.to_string(),
            rank: entry.rank,
            entry,
            total: index.len(),
            nearby,
        })
    }

    pub async fn get_player_rank_default(
        &self,
        leaderboard_id: &str,
        player_id: &str,
    ) -> EngineResult<PlayerStanding> {
        self.get_player_rank(leaderboard_id, player_id, self.limits.default_window)
            .await
    }

    /// Every active entry of the player, newest submission first.
    pub async fn get_player_scores(&self, player_id: &str) -> EngineResult<Vec<PlayerScore>> {
        self.collect_player_scores(None, player_id).await
    }

    /// Same as [`Self::get_player_scores`], limited to one application.
    pub async fn get_player_scores_for_app(
        &self,
        app_id: &str,
        player_id: &str,
    ) -> EngineResult<Vec<PlayerScore>> {
        validate_id("app_id", app_id)?;
        self.collect_player_scores(Some(app_id), player_id).await
    }

    async fn collect_player_scores(
        &self,
        app_id: Option<&str>,
        player_id: &str,
    ) -> EngineResult<Vec<PlayerScore>> {
        validate_id("player_id", player_id)?;
        let mut scores = Vec::new();
        let mut stale = Vec::new();

        for leaderboard_id in self.registry.boards_for(player_id).await {
            let Some(handle) = self.registry.get(&leaderboard_id).await else {
                stale.push(leaderboard_id);
                continue;
            };
            if app_id.is_some_and(|app| handle.meta.app_id != app) {
                continue;
            }
            let index = handle.index.read().await;
            if handle.is_deleted() {
                continue;
            }
            // A link without an entry is a removal in flight.
            if let Some(ranked) = index.entry(player_id) {
                scores.push(PlayerScore {
                    leaderboard: handle.meta.clone(),
                    rank: ranked.rank,
                    entry: ScoreEntry {
                        leaderboard_id: handle.meta.id.clone(),
                        player_id: ranked.player_id,
                        value: ranked.value,
                        submitted_at: ranked.submitted_at,
                        metadata: ranked.metadata,
                        sequence: ranked.sequence,
                    },
                });
            }
        }

        if !stale.is_empty() {
            tracing::debug!(player_id, stale = stale.len(), "Pruning stale reverse links");
            self.registry.prune_unregistered(player_id, &stale).await;
        }

        scores.sort_by(|a, b| {
            b.entry
                .submitted_at
                .cmp(&a.entry.submitted_at)
                .then_with(|| a.leaderboard.id.cmp(&b.leaderboard.id))
        });
        Ok(scores)
    }

    /// Drops one player's active entry (`Active -> Absent`).
    pub async fn remove_score(&self, leaderboard_id: &str, player_id: &str) -> EngineResult<()> {
        validate_id("player_id", player_id)?;
        let handle = self.handle(leaderboard_id).await?;
        let _gate = handle.writer.lock().await;
        handle.ensure_live()?;

        let in_store = self.store.remove(leaderboard_id, player_id).await?;
        let in_index = handle.index.write().await.remove(player_id);
        if !(in_store || in_index) {
            return Err(EngineError::not_ranked(leaderboard_id, player_id));
        }
        self.registry.unlink(player_id, leaderboard_id).await;

        tracing::info!(leaderboard_id, player_id, "Score removed");
        Ok(())
    }

    /// Removes the board, its stored scores and its reverse links.
    ///
    /// A second call fails with `NotFound` and changes nothing.
    pub async fn delete_leaderboard(&self, leaderboard_id: &str) -> EngineResult<()> {
        let handle = self.handle(leaderboard_id).await?;
        let _gate = handle.writer.lock().await;
        handle.ensure_live()?;

        // Store first: if it fails the board stays fully intact.
        self.store.delete(leaderboard_id).await?;
        handle.mark_deleted();

        // Links are keyed by id, so they go while the id is still taken and
        // a recreated board cannot have linked anything yet.
        let players: Vec<String> = {
            let mut index = handle.index.write().await;
            let players = index.player_ids().map(str::to_string).collect();
            *index = RankIndex::new(handle.meta.sort_direction);
            players
        };
        self.registry
            .unlink_many(players.iter().map(String::as_str), leaderboard_id)
            .await;
        self.registry.remove(&handle).await;

        tracing::info!(
            leaderboard_id,
            players = players.len(),
            "Leaderboard deleted"
        );
        Ok(())
    }

    /// Recomputes the board's rank index from the store.
    pub async fn rebuild_index(&self, leaderboard_id: &str) -> EngineResult<usize> {
        let handle = self.handle(leaderboard_id).await?;
        let _gate = handle.writer.lock().await;
        handle.ensure_live()?;

        let entries = self.store.load_all(leaderboard_id).await?;
        let rebuilt = RankIndex::from_entries(handle.meta.sort_direction, entries);
        let now: HashSet<String> = rebuilt.player_ids().map(str::to_string).collect();

        let before: HashSet<String> = {
            let mut index = handle.index.write().await;
            let before = index.player_ids().map(str::to_string).collect();
            *index = rebuilt;
            before
        };

        self.registry
            .unlink_many(before.difference(&now).map(String::as_str), leaderboard_id)
            .await;
        self.registry
            .link_many(now.iter().map(String::as_str), leaderboard_id)
            .await;

        tracing::info!(leaderboard_id, entries = now.len(), "Rank index rebuilt");
        Ok(now.len())
    }

    /// Tears down every board held by this engine. Stored scores are kept.
    pub async fn shutdown(&self) {
        let dropped = self.registry.clear().await;
        tracing::info!(leaderboards = dropped, "Ranking engine shut down");
    }
}
