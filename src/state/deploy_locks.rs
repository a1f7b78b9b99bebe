//! 按仓库加锁
//!
//! 同一 `owner/repo` 的部署串行执行，避免两次投递交错清空暂存目录或站点目录；
//! 不同仓库之间互不影响。没有部署在执行或等待的仓库不保留锁条目

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// 仓库锁表
#[derive(Default)]
pub struct DeployLocks {
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeployLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取仓库锁，guard 释放前同一仓库的其他部署会等待
    pub async fn acquire(&self, repo_key: &str) -> OwnedMutexGuard<()> {
        let lock = self.lock_for(repo_key).await;
        lock.lock_owned().await
    }

    /// 释放仓库锁，没有其他部署在等待时移除锁条目
    pub async fn release(&self, repo_key: &str, guard: OwnedMutexGuard<()>) {
        drop(guard);

        let mut locks = self.locks.write().await;
        // 只剩锁表自己持有引用，说明没有等待者
        if locks
            .get(repo_key)
            .map_or(false, |lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(repo_key);
        }
    }

    /// 仓库当前是否有部署在执行
    pub async fn is_locked(&self, repo_key: &str) -> bool {
        let locks = self.locks.read().await;
        locks
            .get(repo_key)
            .map_or(false, |lock| lock.try_lock().is_err())
    }

    async fn lock_for(&self, repo_key: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(repo_key) {
            return lock.clone();
        }

        let mut locks = self.locks.write().await;
        locks
            .entry(repo_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
