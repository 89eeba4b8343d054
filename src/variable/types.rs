use std::collections::BTreeMap;
use std::sync::Arc;

/// 一次运行内的变量作用域
///
/// 值语义：每个测试步骤拿到当前环境，返回下一步的环境。
/// 内部共享存储，只有在绑定新变量时才复制。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    variables: Arc<BTreeMap<String, String>>,
}

impl Environment {
    /// 创建新的空环境
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取变量值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(|s| s.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }

    /// 返回绑定了 `key` 的新环境，已存在则覆盖
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.variables).insert(key.into(), value.into());
        self
    }

    /// 仅在 `key` 尚未定义时绑定（先定义者优先）
    pub fn with_default(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if self.contains_key(&key) {
            self
        } else {
            self.with(key, value)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 变量数量
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Environment::new(), |env, (k, v)| env.with_default(k, v))
    }
}
