//! # 参数集合
//!
//! 查询串 / 表单请求体的有序参数列表。
//!
//! 不做百分号解码，也不解析 `tags[]=a` 这类数组语法：
//! 条目按 `&` 切分后原样保存、原样拼回，客户端发来的数组参数不会被改写成
//! `tags[0]=a`。只需要按名字查找、删除、追加单个参数。

use std::fmt;

/// 有序、允许重名的 `name=value` 条目集合
///
/// 所有修改操作都返回新的集合，不会改动原值。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamStore {
    entries: Vec<String>,
}

/// 条目的参数名：第一个 `=` 之前的部分，没有 `=` 时为整个条目
fn entry_name(entry: &str) -> &str {
    entry.split_once('=').map_or(entry, |(name, _)| name)
}

impl ParamStore {
    /// 空集合
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// 按 `&` 切分原始串；空串得到空集合
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::new();
        }
        Self {
            entries: raw.split('&').map(str::to_string).collect(),
        }
    }

    /// 用 `&` 拼回原始串
    #[must_use]
    pub fn serialize(&self) -> String {
        self.entries.join("&")
    }

    /// 第一个同名条目的值；条目没有 `=` 时为空串
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|entry| match entry.split_once('=') {
            Some((key, value)) if key == name => Some(value),
            None if entry == name => Some(""),
            _ => None,
        })
    }

    /// 去掉所有同名条目，其余条目保持原顺序
    #[must_use]
    pub fn remove(&self, name: &str) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|entry| entry_name(entry) != name)
                .cloned()
                .collect(),
        }
    }

    /// 先删除同名条目，再在末尾追加一条 `name=value`
    #[must_use]
    pub fn add(&self, name: &str, value: &str) -> Self {
        let mut store = self.remove(name);
        store.entries.push(format!("{name}={value}"));
        store
    }

    /// 是否包含同名条目
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry_name(entry) == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 按顺序遍历原始条目
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl fmt::Display for ParamStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("api_key=abc&x=1", "api_key", Some("abc"))]
    #[case("x=1&flag&y=2", "flag", Some(""))]
    #[case("a=1&a=2", "a", Some("1"))]
    #[case("a=b=c", "a", Some("b=c"))]
    #[case("a=", "a", Some(""))]
    #[case("ab=1", "a", None)]
    #[case("", "a", None)]
    fn get_returns_first_match(
        #[case] raw: &str,
        #[case] name: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(ParamStore::parse(raw).get(name), expected);
    }

    #[test]
    fn array_syntax_is_left_alone() {
        let store = ParamStore::parse("tags[]=a&tags[]=b&tags=c&tags=d");
        assert_eq!(store.serialize(), "tags[]=a&tags[]=b&tags=c&tags=d");
        assert_eq!(store.get("tags[]"), Some("a"));
        assert_eq!(store.remove("tags").serialize(), "tags[]=a&tags[]=b");
    }

    #[test]
    fn percent_encoding_is_preserved() {
        let store = ParamStore::parse("title=Hello%20World&raw=a%26b");
        assert_eq!(store.get("title"), Some("Hello%20World"));
        assert_eq!(store.serialize(), "title=Hello%20World&raw=a%26b");
    }

    #[test]
    fn remove_drops_every_entry_and_keeps_order() {
        let store = ParamStore::parse("k=1&a=x&k&b=y&k=3");
        let removed = store.remove("k");
        assert_eq!(removed.serialize(), "a=x&b=y");
        // 原集合不受影响
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn add_replaces_existing_entries() {
        let store = ParamStore::parse("k=1&a=x&k=2");
        let added = store.add("k", "v");
        assert_eq!(added.serialize(), "a=x&k=v");
        assert_eq!(added.iter().filter(|e| e.starts_with("k=")).count(), 1);
    }

    #[test]
    fn add_on_empty_store() {
        let store = ParamStore::new().add("api_key", "master");
        assert_eq!(store.to_string(), "api_key=master");
        assert!(store.contains("api_key"));
    }

    #[test]
    fn empty_raw_string_is_empty_store() {
        let store = ParamStore::parse("");
        assert!(store.is_empty());
        assert_eq!(store.serialize(), "");
    }

    proptest! {
        #[test]
        fn parse_serialize_round_trip(entries in prop::collection::vec("[a-z0-9=%\\[\\]]{1,8}", 1..8)) {
            let raw = entries.join("&");
            let store = ParamStore::parse(&raw);
            prop_assert_eq!(store.serialize(), raw.clone());
            prop_assert_eq!(ParamStore::parse(&store.serialize()), store);
        }

        #[test]
        fn add_after_remove_leaves_single_entry(
            entries in prop::collection::vec("(k|a|b)(=[a-z0-9]{0,3})?", 0..8),
            value in "[a-z0-9]{0,5}",
        ) {
            let store = ParamStore::parse(&entries.join("&"));
            let updated = store.remove("k").add("k", &value);
            let named: Vec<&str> = updated.iter().filter(|e| entry_name(e) == "k").collect();
            let expected = format!("k={value}");
            prop_assert_eq!(named, vec![expected.as_str()]);
            prop_assert_eq!(updated.get("k"), Some(value.as_str()));
        }
    }
}
