use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::RandomizerConfig;
use crate::error::{StoreError, StoreResult};
use crate::naming::{create_naming_strategy, NamingStrategy};
use crate::path::{project_root, resolve_secure_path};
use crate::types::{ClassMap, CollisionPolicy};

/// 冲突重试上限，超过后接受最后一个候选 id
const MAX_ATTEMPTS: u32 = 64;

/// 类名映射存储 —— 标记转换（唯一写者）和样式表转换（只读）之间
/// 唯一的共享状态。
///
/// 内存中的映射由互斥锁保护，可以通过 `&` / `Arc` 在并发的文件转换之间共享。
/// 跨进程只通过落盘的 JSON 文件通信。
pub struct ClassMapStore {
    root: PathBuf,
    path: PathBuf,
    collision_policy: CollisionPolicy,
    naming: Box<dyn NamingStrategy>,
    state: Mutex<StoreState>,
    /// 串行化落盘，避免旧快照覆盖新快照
    write_lock: Mutex<()>,
    cache: Mutex<Option<CachedMap>>,
}

#[derive(Default)]
struct StoreState {
    map: ClassMap,
    /// 已分配的 id，用于冲突检查
    assigned: HashSet<String>,
    /// 每次新增映射递增
    generation: u64,
    flushed_generation: u64,
    last_mutation: Option<Instant>,
}

/// 读取缓存，以文件修改时间 + 长度为键
struct CachedMap {
    modified: SystemTime,
    len: u64,
    map: Arc<ClassMap>,
}

impl ClassMapStore {
    /// 打开一个空的存储。配置和映射文件路径在这里校验，
    /// 越界路径、过短的 id 长度立即报错。
    ///
    /// 相对的 `root` 先基于当前工作目录转成绝对路径。
    pub fn open(root: impl Into<PathBuf>, config: &RandomizerConfig) -> StoreResult<Self> {
        config.validate()?;
        let root = root.into();
        let root = std::path::absolute(&root).map_err(|source| StoreError::ReadFailure {
            path: root.clone(),
            source,
        })?;
        let path = resolve_secure_path(&root, &config.map_path)?;

        Ok(Self {
            root,
            path,
            collision_policy: config.collision_policy,
            naming: create_naming_strategy(config.id_mode, config.id_length),
            state: Mutex::new(StoreState::default()),
            write_lock: Mutex::new(()),
            cache: Mutex::new(None),
        })
    }

    /// 以当前工作目录为项目根目录打开
    pub fn open_in_cwd(config: &RandomizerConfig) -> StoreResult<Self> {
        Self::open(project_root()?, config)
    }

    /// 映射文件的绝对路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 返回类名对应的 id，不存在则生成并插入。
    ///
    /// 只修改内存，不落盘。
    pub fn get_or_create(&self, class: &str) -> String {
        let mut state = self.state.lock();
        if let Some(id) = state.map.get(class) {
            return id.clone();
        }

        let id = self.fresh_id(class, &state.assigned);
        state.assigned.insert(id.clone());
        state.map.insert(class.to_string(), id.clone());
        state.generation += 1;
        state.last_mutation = Some(Instant::now());
        id
    }

    fn fresh_id(&self, class: &str, assigned: &HashSet<String>) -> String {
        let mut attempt = 0;
        loop {
            let candidate = self.naming.generate_id(class, attempt);
            if self.collision_policy == CollisionPolicy::Allow || !assigned.contains(&candidate) {
                return candidate;
            }

            attempt += 1;
            if attempt >= MAX_ATTEMPTS {
                warn!(class, id = %candidate, "giving up on unique id after {MAX_ATTEMPTS} attempts");
                return candidate;
            }
            warn!(class, id = %candidate, attempt, "obfuscated id collision, regenerating");
        }
    }

    /// 只查询，不生成
    pub fn get(&self, class: &str) -> Option<String> {
        self.state.lock().map.get(class).cloned()
    }

    /// 当前内存映射的拷贝
    pub fn snapshot(&self) -> ClassMap {
        self.state.lock().map.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().map.is_empty()
    }

    /// 是否有尚未落盘的映射
    pub fn is_dirty(&self) -> bool {
        let state = self.state.lock();
        state.generation != state.flushed_generation
    }

    /// 最近一次新增映射的时间
    pub fn last_mutation(&self) -> Option<Instant> {
        self.state.lock().last_mutation
    }

    /// 将内存映射完整写入映射文件（先写临时文件再原子重命名）。
    pub fn flush(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock();

        let (bytes, generation, count) = {
            let state = self.state.lock();
            let bytes = serde_json::to_vec_pretty(&state.map)?;
            (bytes, state.generation, state.map.len())
        };

        // 每次写入前重新校验路径
        let path = resolve_secure_path(&self.root, &self.path)?;
        write_atomic(&path, &bytes)?;

        let mut state = self.state.lock();
        if state.flushed_generation < generation {
            state.flushed_generation = generation;
        }
        info!(entries = count, path = %path.display(), "class map flushed");
        Ok(())
    }

    /// 读取落盘的映射文件。
    ///
    /// - 文件不存在：`Ok(None)`，表示还没有任何映射
    /// - 不是 JSON 对象（数组、标量、null）：`CorruptMap`
    ///
    /// 文件修改时间和长度未变时直接返回缓存。
    pub fn load(&self) -> StoreResult<Option<Arc<ClassMap>>> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                *self.cache.lock() = None;
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::ReadFailure {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let modified = metadata.modified().ok();
        let len = metadata.len();

        if let Some(modified) = modified {
            if let Some(cached) = self.cache.lock().as_ref() {
                if cached.modified == modified && cached.len == len {
                    debug!(path = %self.path.display(), "class map cache hit");
                    return Ok(Some(cached.map.clone()));
                }
            }
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::ReadFailure {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let map: ClassMap =
            serde_json::from_str(&content).map_err(|source| StoreError::CorruptMap {
                path: self.path.clone(),
                source,
            })?;
        let map = Arc::new(map);

        *self.cache.lock() = modified.map(|modified| CachedMap {
            modified,
            len,
            map: map.clone(),
        });

        Ok(Some(map))
    }

    /// 结束存储生命周期：有未落盘的映射则落盘
    pub fn close(self) -> StoreResult<()> {
        if self.is_dirty() {
            self.flush()?;
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let write_failure = |source: io::Error| StoreError::WriteFailure {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(write_failure)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_failure)?;
    tmp.write_all(bytes).map_err(write_failure)?;
    tmp.flush().map_err(write_failure)?;
    tmp.persist(path).map_err(|err| write_failure(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{is_obfuscated_id, IdMode};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> ClassMapStore {
        ClassMapStore::open(dir.path(), &RandomizerConfig::default()).unwrap()
    }

    #[test]
    fn test_get_or_create_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let id1 = store.get_or_create("flex");
        let id2 = store.get_or_create("flex");
        assert_eq!(id1, id2);
        assert!(is_obfuscated_id(&id1, 8));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_different_tokens_different_ids() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        let a = store.get_or_create("flex");
        let b = store.get_or_create("hidden");
        assert_ne!(a, b);
        assert_eq!(store.get("hidden"), Some(b));
        assert_eq!(store.get("block"), None);
    }

    #[test]
    fn test_get_or_create_does_not_write() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        store.get_or_create("flex");
        assert!(store.is_dirty());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_flush_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.get_or_create("flex");
        store.get_or_create("md:hover:bg-blue-500/50");
        store.get_or_create("w-[100px]");

        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.path(), dir.path().join(".next/class-map.json"));

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(*loaded, store.snapshot());
    }

    #[test]
    fn test_flush_writes_pretty_json_object() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let id = store.get_or_create("flex");
        store.flush().unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, format!("{{\n  \"flex\": \"{id}\"\n}}"));
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_load_rejects_non_objects() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();

        for content in ["[]", "null", "42", "\"flex\"", "{\"flex\": 1}", "{not json"] {
            fs::write(store.path(), content).unwrap();
            let err = store.load().unwrap_err();
            assert!(
                matches!(err, StoreError::CorruptMap { .. }),
                "{content} should be corrupt"
            );
            assert!(err.is_read_error());
        }
    }

    #[test]
    fn test_load_sees_external_rewrites() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();

        fs::write(store.path(), r#"{"flex":"abcDEFgh"}"#).unwrap();
        let first = store.load().unwrap().unwrap();
        assert_eq!(first.get("flex").map(String::as_str), Some("abcDEFgh"));

        // 长度不同，即使修改时间精度不足也会重新读取
        fs::write(store.path(), r#"{"flex":"abcDEFgh","block":"zzzZZZzz"}"#).unwrap();
        let second = store.load().unwrap().unwrap();
        assert_eq!(second.len(), 2);
    }

    #[test]
    fn test_load_cache_returns_same_arc() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.get_or_create("flex");
        store.flush().unwrap();

        let a = store.load().unwrap().unwrap();
        let b = store.load().unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_open_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let config = RandomizerConfig {
            map_path: PathBuf::from("../class-map.json"),
            ..Default::default()
        };
        let err = ClassMapStore::open(dir.path(), &config).err().unwrap();
        assert!(matches!(err, StoreError::PathTraversal { .. }));
    }

    #[test]
    fn test_open_rejects_short_id_length() {
        let dir = TempDir::new().unwrap();
        let config = RandomizerConfig {
            id_length: 0,
            ..Default::default()
        };
        let err = ClassMapStore::open(dir.path(), &config).err().unwrap();
        assert!(matches!(err, StoreError::InvalidIdLength { length: 0, .. }));
    }

    #[test]
    fn test_open_relative_root_is_made_absolute() {
        let store = ClassMapStore::open("../proj", &RandomizerConfig::default()).unwrap();
        let cwd = std::env::current_dir().unwrap();
        let parent = cwd.parent().unwrap_or(&cwd);

        assert!(store.root().is_absolute());
        assert_eq!(store.path(), parent.join("proj/.next/class-map.json"));
    }

    #[test]
    fn test_flush_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // 用普通文件占住 `.next`，目录创建必然失败
        fs::write(dir.path().join(".next"), "").unwrap();
        let store = open(&dir);
        store.get_or_create("flex");

        let err = store.flush().unwrap_err();
        assert!(matches!(err, StoreError::WriteFailure { .. }));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_close_flushes_pending() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.get_or_create("flex");
        let path = store.path().to_path_buf();

        store.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        for class in ["z-10", "a-1", "m-2"] {
            store.get_or_create(class);
        }
        let keys: Vec<String> = store.snapshot().keys().cloned().collect();
        assert_eq!(keys, vec!["z-10", "a-1", "m-2"]);
    }

    #[test]
    fn test_stable_mode_matches_across_stores() {
        let config = RandomizerConfig {
            id_mode: IdMode::Stable,
            ..Default::default()
        };
        let dir = TempDir::new().unwrap();
        let a = ClassMapStore::open(dir.path(), &config).unwrap();
        let b = ClassMapStore::open(dir.path(), &config).unwrap();
        assert_eq!(a.get_or_create("md:flex"), b.get_or_create("md:flex"));
    }

    /// 总是返回同一个 id 的策略，用于触发冲突
    struct FixedNaming;

    impl NamingStrategy for FixedNaming {
        fn generate_id(&self, _class: &str, attempt: u32) -> String {
            if attempt == 0 {
                "aaaaaaaa".to_string()
            } else {
                format!("aaaaaaa{}", ['b', 'c', 'd', 'e'][(attempt as usize - 1) % 4])
            }
        }
    }

    fn with_naming(dir: &TempDir, policy: CollisionPolicy) -> ClassMapStore {
        let mut store = open(dir);
        store.naming = Box::new(FixedNaming);
        store.collision_policy = policy;
        store
    }

    #[test]
    fn test_collision_regenerates() {
        let dir = TempDir::new().unwrap();
        let store = with_naming(&dir, CollisionPolicy::Regenerate);
        let a = store.get_or_create("flex");
        let b = store.get_or_create("block");
        assert_eq!(a, "aaaaaaaa");
        assert_eq!(b, "aaaaaaab");
    }

    #[test]
    fn test_collision_allowed() {
        let dir = TempDir::new().unwrap();
        let store = with_naming(&dir, CollisionPolicy::Allow);
        assert_eq!(store.get_or_create("flex"), store.get_or_create("block"));
    }

    #[test]
    fn test_concurrent_get_or_create() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(open(&dir));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| store.get_or_create(&format!("p-{i}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for ids in &results[1..] {
            assert_eq!(ids, &results[0]);
        }
        assert_eq!(store.len(), 50);
    }
}
