//! エラーの分類と終了コードの対応。
use anyhow::Error;

use crate::config::ConfigError;
use crate::corpus::CorpusError;
use crate::pipeline::ExperimentError;

/// `EIO`
pub const EXIT_IO: i32 = 5;
/// `E2BIG`
pub const EXIT_TOO_MANY_ARGUMENTS: i32 = 7;
/// `EINVAL`
pub const EXIT_INVALID: i32 = 22;
pub const EXIT_FAILURE: i32 = 1;

/// エラーの種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 引数が多すぎる
    TooManyArguments,
    /// 引数不足・不正な引数や設定値
    Usage,
    /// ファイルの読み書きに失敗した
    Io,
    /// それ以外
    Other,
}

impl ErrorKind {
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::TooManyArguments => EXIT_TOO_MANY_ARGUMENTS,
            Self::Usage => EXIT_INVALID,
            Self::Io => EXIT_IO,
            Self::Other => EXIT_FAILURE,
        }
    }
}

/// エラーチェーンを先頭からたどって最初に分類できたものを返す。
#[must_use]
pub fn classify_error(error: &Error) -> ErrorKind {
    for cause in error.chain() {
        if let Some(config_error) = cause.downcast_ref::<ConfigError>() {
            return match config_error {
                ConfigError::TooManyArguments(_) => ErrorKind::TooManyArguments,
                _ => ErrorKind::Usage,
            };
        }
        if let Some(ExperimentError::TooManyUsers { .. }) = cause.downcast_ref::<ExperimentError>()
        {
            return ErrorKind::Usage;
        }
        if let Some(CorpusError::Io { .. }) = cause.downcast_ref::<CorpusError>() {
            return ErrorKind::Io;
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return ErrorKind::Io;
        }
    }
    ErrorKind::Other
}

#[must_use]
pub fn exit_code(error: &Error) -> i32 {
    classify_error(error).exit_code()
}

/// 引数エラーなら使い方を表示すべきかどうか。
#[must_use]
pub fn is_usage_error(error: &Error) -> bool {
    matches!(
        classify_error(error),
        ErrorKind::Usage | ErrorKind::TooManyArguments
    )
}
