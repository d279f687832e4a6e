use crate::types::{IdMode, ID_ALPHABET};

/// id 生成策略 trait
///
/// `attempt` 在发生冲突重试时递增，确定性策略需要用它改变输出。
pub trait NamingStrategy: Send + Sync {
    fn generate_id(&self, class: &str, attempt: u32) -> String;
}

/// 随机命名：nanoid + 52 字母表
pub struct RandomNaming {
    length: usize,
}

impl RandomNaming {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl NamingStrategy for RandomNaming {
    fn generate_id(&self, _class: &str, _attempt: u32) -> String {
        nanoid::format(nanoid::rngs::default, &ID_ALPHABET, self.length)
    }
}

/// 稳定命名：基于类名内容的 blake3 hash 映射到字母表
///
/// 同一类名在不同构建中得到相同 id，利于缓存。
pub struct StableNaming {
    length: usize,
}

impl StableNaming {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl NamingStrategy for StableNaming {
    fn generate_id(&self, class: &str, attempt: u32) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(class.as_bytes());
        if attempt > 0 {
            hasher.update(&attempt.to_le_bytes());
        }

        let mut reader = hasher.finalize_xof();
        let mut id = String::with_capacity(self.length);
        let mut buf = [0u8; 1];
        while id.len() < self.length {
            reader.fill(&mut buf);
            // 拒绝采样避免取模偏差：256 = 4 * 52 + 48
            if buf[0] < 208 {
                id.push(ID_ALPHABET[(buf[0] % 52) as usize]);
            }
        }
        id
    }
}

/// 根据 IdMode 创建对应的策略
pub fn create_naming_strategy(mode: IdMode, length: usize) -> Box<dyn NamingStrategy> {
    match mode {
        IdMode::Random => Box::new(RandomNaming::new(length)),
        IdMode::Stable => Box::new(StableNaming::new(length)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::is_obfuscated_id;

    #[test]
    fn test_random_naming_shape() {
        let naming = RandomNaming::new(8);
        for _ in 0..100 {
            let id = naming.generate_id("flex", 0);
            assert!(is_obfuscated_id(&id, 8), "unexpected id {id}");
        }
    }

    #[test]
    fn test_random_naming_varies() {
        let naming = RandomNaming::new(8);
        let a = naming.generate_id("flex", 0);
        let b = naming.generate_id("flex", 0);
        assert_ne!(a, b, "52^8 ids should not repeat in two draws");
    }

    #[test]
    fn test_stable_naming_stability() {
        let naming = StableNaming::new(8);
        let name1 = naming.generate_id("md:flex", 0);
        let name2 = naming.generate_id("md:flex", 0);
        assert_eq!(name1, name2, "Stable naming should be stable");
        assert!(is_obfuscated_id(&name1, 8));
    }

    #[test]
    fn test_stable_naming_different_inputs() {
        let naming = StableNaming::new(8);
        assert_ne!(naming.generate_id("p-4", 0), naming.generate_id("p-8", 0));
    }

    #[test]
    fn test_stable_naming_attempt_changes_output() {
        let naming = StableNaming::new(8);
        assert_ne!(naming.generate_id("flex", 0), naming.generate_id("flex", 1));
    }

    #[test]
    fn test_custom_length() {
        let naming = create_naming_strategy(IdMode::Stable, 12);
        assert_eq!(naming.generate_id("flex", 0).len(), 12);
        let naming = create_naming_strategy(IdMode::Random, 5);
        assert_eq!(naming.generate_id("flex", 0).len(), 5);
    }
}
