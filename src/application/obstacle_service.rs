use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::common::{
    ApplicationError, ApplicationResult, CacheStore, DomainError, RetryPolicy,
};
use crate::domains::wall::{Cell, ObstacleMap, WallEvent, WallSurface};

use super::repository::StateRepository;

fn cache_key(wall_id: &str) -> String {
    format!("obstacle:{}", wall_id)
}

/// Write-through obstacle cache in front of the durable store.
///
/// Consistency is bounded-staleness, not strict: a cached map is served
/// until its TTL lapses or an ingestion evicts it, and planning requests
/// declare the minimum version they will accept so a stale read is
/// detected instead of silently used. Reads that fall through to the
/// durable store are retried with bounded backoff.
pub struct ObstacleCacheService {
    repo: Arc<StateRepository>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    retry: RetryPolicy,
}

impl ObstacleCacheService {
    pub fn new(
        repo: Arc<StateRepository>,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repo,
            cache,
            ttl,
            retry,
        }
    }

    /// Register a wall surface together with its initial obstacle data
    /// (map version 1).
    pub async fn register_wall(
        &self,
        surface: WallSurface,
        blocked: BTreeSet<Cell>,
    ) -> ApplicationResult<u64> {
        match self.repo.load_wall(&surface.id).await {
            Ok(_) => {
                return Err(ApplicationError::Domain(DomainError::Conflict {
                    reason: format!("wall {} is already registered", surface.id),
                }));
            }
            Err(ApplicationError::Domain(DomainError::NotFound { .. })) => {}
            Err(err) => return Err(err),
        }
        let map = ObstacleMap::new(surface.id.clone(), 1, blocked);
        self.repo.save_wall(&surface).await?;
        self.repo.save_obstacle_map(&map).await?;
        self.write_through(&map).await;
        self.repo
            .append_wall_event(&WallEvent::WallRegistered {
                wall_id: surface.id.clone(),
                width_m: surface.width_m,
                height_m: surface.height_m,
                resolution_m: surface.resolution_m,
                timestamp: surface.created_at,
            })
            .await?;
        tracing::info!(
            "registered wall {} ({}x{} cells)",
            surface.id,
            surface.cols(),
            surface.rows()
        );
        Ok(map.version)
    }

    pub async fn get_surface(&self, wall_id: &str) -> ApplicationResult<WallSurface> {
        self.repo.load_wall(wall_id).await
    }

    /// The most recent obstacle map with `version >= min_version`.
    ///
    /// Served from cache when possible; read-through on miss or when the
    /// cached copy is too old. `NotFound` for unknown walls, `Stale` when
    /// even the durable store cannot satisfy `min_version`.
    pub async fn get_map(
        &self,
        wall_id: &str,
        min_version: u64,
    ) -> ApplicationResult<Arc<ObstacleMap>> {
        match self.cache.get(&cache_key(wall_id)).await {
            Ok(Some(raw)) => match serde_json::from_str::<ObstacleMap>(&raw) {
                Ok(map) if map.version >= min_version => {
                    return Ok(Arc::new(map));
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!("discarding undecodable cache entry for {}: {}", wall_id, err)
                }
            },
            Ok(None) => {}
            Err(err) => tracing::warn!("obstacle cache read failed for {}: {}", wall_id, err),
        }

        // Read-through. The wall must exist and the newest durable version
        // must satisfy the caller's floor.
        self.repo.load_wall(wall_id).await?;
        let newest = self
            .retry
            .run("load latest obstacle version", || async move {
                self.repo
                    .latest_obstacle_version(wall_id)
                    .await
                    .map_err(|e| e.to_string())
            })
            .await
            .map_err(|(_, err)| ApplicationError::StateStore(err))?
            .ok_or_else(|| {
                ApplicationError::Domain(DomainError::NotFound {
                    resource: "obstacle map",
                    id: wall_id.to_string(),
                })
            })?;
        if newest < min_version {
            return Err(ApplicationError::Domain(DomainError::Stale {
                wall_id: wall_id.to_string(),
                min_version,
                newest,
            }));
        }

        let map = self
            .retry
            .run("load obstacle map", || async move {
                self.repo
                    .load_obstacle_map(wall_id, newest)
                    .await
                    .map_err(|e| e.to_string())
            })
            .await
            .map_err(|(_, err)| ApplicationError::StateStore(err))?;
        self.write_through(&map).await;
        Ok(Arc::new(map))
    }

    /// Ingest new obstacle data: creates the successor map version,
    /// persists it and updates the cache write-through. Planners holding a
    /// snapshot of an earlier version are unaffected.
    pub async fn ingest(
        &self,
        wall_id: &str,
        blocked: BTreeSet<Cell>,
        timestamp: DateTime<Utc>,
    ) -> ApplicationResult<u64> {
        self.repo.load_wall(wall_id).await?;
        let current = self
            .repo
            .latest_obstacle_version(wall_id)
            .await?
            .unwrap_or(0);
        let map = ObstacleMap {
            wall_id: wall_id.to_string(),
            version: current + 1,
            blocked,
            updated_at: timestamp,
        };
        self.repo.save_obstacle_map(&map).await?;
        self.write_through(&map).await;
        self.repo
            .append_wall_event(&WallEvent::ObstaclesIngested {
                wall_id: wall_id.to_string(),
                new_version: map.version,
                timestamp,
            })
            .await?;
        tracing::info!(
            "ingested obstacle data for wall {}: version {} ({} blocked cells)",
            wall_id,
            map.version,
            map.blocked.len()
        );
        Ok(map.version)
    }

    /// Apply an ingestion notice raised by another process: the local
    /// cached copy is stale, evict it.
    pub async fn handle_ingestion(&self, event: &WallEvent) -> ApplicationResult<()> {
        if let WallEvent::ObstaclesIngested {
            wall_id,
            new_version,
            ..
        } = event
        {
            tracing::debug!(
                "obstacle ingestion notice for wall {} (version {})",
                wall_id,
                new_version
            );
            self.invalidate(wall_id).await?;
        }
        Ok(())
    }

    /// Evict the cached entry for a wall.
    pub async fn invalidate(&self, wall_id: &str) -> ApplicationResult<()> {
        self.cache
            .delete(&cache_key(wall_id))
            .await
            .map_err(ApplicationError::Cache)?;
        tracing::debug!("evicted cached obstacle map for wall {}", wall_id);
        Ok(())
    }

    async fn write_through(&self, map: &ObstacleMap) {
        match serde_json::to_string(map) {
            Ok(raw) => {
                if let Err(err) = self.cache.set(&cache_key(&map.wall_id), raw, self.ttl).await {
                    tracing::warn!("obstacle cache write failed for {}: {}", map.wall_id, err);
                }
            }
            Err(err) => tracing::warn!("failed to encode obstacle map for cache: {}", err),
        }
    }
}
