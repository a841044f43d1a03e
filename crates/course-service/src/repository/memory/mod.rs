//! 内存仓储实现
//!
//! 基于 DashMap 的进程内存储，`storage.backend = "memory"` 时使用，
//! 同时作为服务层测试的数据源。数据不持久化。

mod chat_repo;
mod course_repo;
mod notification_repo;
mod payment_repo;
mod promo_code_repo;
mod stream_repo;

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

pub use chat_repo::MemoryChatRepository;
pub use course_repo::MemoryCourseRepository;
pub use notification_repo::MemoryNotificationRepository;
pub use payment_repo::MemoryPaymentRepository;
pub use promo_code_repo::MemoryPromoCodeRepository;
pub use stream_repo::MemoryStreamRepository;

/// 通用内存存储
///
/// 单条记录的读改写在 DashMap 分片锁内完成，可用于实现比较并设置语义
#[derive(Debug)]
pub struct MemoryStore<K, T>
where
    K: Eq + Hash,
{
    data: Arc<DashMap<K, T>>,
}

impl<K: Eq + Hash + Clone, T: Clone> Default for MemoryStore<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone, T: Clone> MemoryStore<K, T> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// 插入或覆盖
    pub fn insert(&self, key: K, value: T) {
        self.data.insert(key, value);
    }

    /// 键不存在时插入 `make()` 的结果，检查与插入在同一把分片锁内完成
    ///
    /// 返回当前值，以及该值是否由本次调用插入
    pub fn get_or_insert_with<F>(&self, key: K, make: F) -> (T, bool)
    where
        F: FnOnce() -> T,
    {
        match self.data.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => (entry.insert(make()).value().clone(), true),
        }
    }

    /// 返回数据的克隆，不持有锁
    pub fn get(&self, key: &K) -> Option<T> {
        self.data.get(key).map(|v| v.clone())
    }

    pub fn remove(&self, key: &K) -> Option<T> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    /// 按条件筛选数据
    pub fn list_by<F>(&self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        self.data
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// 按条件筛选 key
    pub fn keys_by<F>(&self, predicate: F) -> Vec<K>
    where
        F: Fn(&T) -> bool,
    {
        self.data
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn count_by<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        self.data.iter().filter(|entry| predicate(entry.value())).count()
    }

    /// 在锁内修改单条记录并返回修改后的克隆，记录不存在时返回 None
    pub fn update<F>(&self, key: &K, f: F) -> Option<T>
    where
        F: FnOnce(&mut T),
    {
        self.data.get_mut(key).map(|mut entry| {
            f(entry.value_mut());
            entry.value().clone()
        })
    }

    /// 在锁内按条件修改：`f` 返回 false 时视为条件不满足
    ///
    /// 返回 `Some(true)` 表示已修改，`Some(false)` 表示条件不满足，None 表示记录不存在
    pub fn update_if<F>(&self, key: &K, f: F) -> Option<bool>
    where
        F: FnOnce(&mut T) -> bool,
    {
        self.data.get_mut(key).map(|mut entry| f(entry.value_mut()))
    }

    /// 删除满足条件的记录，返回删除数量
    pub fn remove_by<F>(&self, predicate: F) -> usize
    where
        F: Fn(&T) -> bool,
    {
        let before = self.data.len();
        self.data.retain(|_, v| !predicate(v));
        before - self.data.len()
    }
}

impl<K: Eq + Hash, T> Clone for MemoryStore<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

/// 自增 ID 序列
#[derive(Debug, Default)]
pub struct IdSequence(AtomicI64);

impl IdSequence {
    pub fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}
