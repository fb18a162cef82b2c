//! # 错误处理宏

/// 构造带消息的 `ProxyError` 变体
///
/// 仅适用于形如 `{ message, source }` 的变体，例如
/// `crate::error!(Config, "缺少上游地址")`。
#[macro_export]
macro_rules! error {
    ($variant:ident, $msg:expr) => {
        $crate::error::ProxyError::$variant {
            message: ($msg).into(),
            source: None,
        }
    };
    ($variant:ident, $fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::$variant {
            message: format!($fmt, $($arg)*),
            source: None,
        }
    };
}

/// 条件不成立时提前返回给定错误（会经过 `Into` 转换）
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err(($err).into());
        }
    };
}

/// 立即返回给定错误（会经过 `Into` 转换）
#[macro_export]
macro_rules! bail {
    ($err:expr $(,)?) => {
        return Err(($err).into())
    };
}
