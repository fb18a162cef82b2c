//! 上游地址解析工具
//!
//! 校验配置中的论坛地址，并负责拼接转发地址与重定向地址。

use crate::ensure;
use crate::error::ConfigResult;
use crate::error::config::ConfigError;
use url::Url;

use super::params::ParamStore;

/// 上游论坛根地址（已去掉末尾的 `/`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamBase {
    base: String,
}

impl UpstreamBase {
    /// 解析配置中的 `upstream.url`
    ///
    /// 缺少 scheme 时按 https 处理；只接受 http / https。
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let trimmed = raw.trim();
        ensure!(
            !trimmed.is_empty(),
            ConfigError::invalid("upstream.url", "不能为空")
        );

        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };

        let url = Url::parse(&candidate)?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            ConfigError::invalid("upstream.url", format!("不支持的协议: {}", url.scheme()))
        );
        ensure!(
            url.host().is_some(),
            ConfigError::invalid("upstream.url", format!("缺少 host: {trimmed}"))
        );

        Ok(Self {
            base: candidate.trim_end_matches('/').to_string(),
        })
    }

    /// 根地址
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.base
    }

    /// `<base>/<path>`，path 开头的 `/` 会被去掉
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// 转发地址：总是带 `?`，后接剩余查询参数
    #[must_use]
    pub fn forward_url(&self, path: &str, query: &ParamStore) -> String {
        format!("{}?{}", self.url_for(path), query.serialize())
    }

    /// 重定向地址：只有剩余查询参数非空时才带 `?`
    #[must_use]
    pub fn redirect_url(&self, path: &str, query: &ParamStore) -> String {
        if query.is_empty() {
            self.url_for(path)
        } else {
            format!("{}?{}", self.url_for(path), query.serialize())
        }
    }
}

/// 路径是否可以原样用于白名单匹配和转发
///
/// URL 解析会折叠 `.` / `..` 段（包括 `%2e` 编码形式，`\` 也按分隔符处理），
/// 空段则会在拼接时改变路径含义。含有这些段的路径被拒绝，
/// 保证授权时匹配的路径就是发给上游的路径。末尾的 `/` 允许。
#[must_use]
pub fn is_plain_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split(['/', '\\']).skip(1).collect();
    let last = segments.len().saturating_sub(1);
    segments.iter().enumerate().all(|(index, segment)| {
        if segment.is_empty() {
            return index == last;
        }
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded != "." && decoded != ".."
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let base = UpstreamBase::parse("https://forums.example.com//").unwrap();
        assert_eq!(base.as_str(), "https://forums.example.com");
        assert_eq!(
            base.url_for("/categories.json"),
            "https://forums.example.com/categories.json"
        );
        assert_eq!(base.url_for("/"), "https://forums.example.com/");
    }

    #[test]
    fn missing_scheme_defaults_to_https() {
        let base = UpstreamBase::parse("forums.example.com/").unwrap();
        assert_eq!(base.as_str(), "https://forums.example.com");
    }

    #[test]
    fn base_with_sub_path() {
        let base = UpstreamBase::parse("http://127.0.0.1:3000/forum/").unwrap();
        assert_eq!(
            base.url_for("//latest.json"),
            "http://127.0.0.1:3000/forum/latest.json"
        );
    }

    #[test]
    fn forward_url_always_has_question_mark() {
        let base = UpstreamBase::parse("https://f.example").unwrap();
        assert_eq!(
            base.forward_url("/c.json", &ParamStore::new()),
            "https://f.example/c.json?"
        );
        assert_eq!(
            base.forward_url("/c.json", &ParamStore::parse("page=2&tags[]=a")),
            "https://f.example/c.json?page=2&tags[]=a"
        );
    }

    #[test]
    fn redirect_url_omits_empty_query() {
        let base = UpstreamBase::parse("https://f.example").unwrap();
        assert_eq!(
            base.redirect_url("/anything", &ParamStore::new()),
            "https://f.example/anything"
        );
        assert_eq!(
            base.redirect_url("/t/1", &ParamStore::parse("page=3")),
            "https://f.example/t/1?page=3"
        );
    }

    #[rstest]
    #[case("/", true)]
    #[case("/categories.json", true)]
    #[case("/t/1/", true)]
    #[case("/t/some.slug/1.json", true)]
    #[case("/t/...json", true)]
    #[case("/t/../admin.json", false)]
    #[case("/t/..", false)]
    #[case("/t/./1", false)]
    #[case("/t/%2e%2e/admin.json", false)]
    #[case("/t/%2E./admin.json", false)]
    #[case("/t/.%2e/admin.json", false)]
    #[case("/t/%2e/1", false)]
    #[case("/t//1", false)]
    #[case("//admin.json", false)]
    #[case("/t/..\\admin.json", false)]
    fn plain_path_detection(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_plain_path(path), expected);
    }

    #[test]
    fn rejects_empty_and_unsupported() {
        assert!(matches!(
            UpstreamBase::parse("   "),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            UpstreamBase::parse("ftp://files.example.com"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            UpstreamBase::parse("http://"),
            Err(ConfigError::Url(_))
        ));
    }
}
