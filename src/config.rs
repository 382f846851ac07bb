//! 実行時設定。
//!
//! 優先順位（高い順）:
//! 1. コマンドライン第1引数
//! 2. 環境変数 `LIBRARY_CATALOG_DIR`
//! 3. 既定値 `./data`

use std::path::PathBuf;

pub const DATA_DIR_ENV: &str = "LIBRARY_CATALOG_DIR";
pub const DEFAULT_DATA_DIR: &str = "data";
/// 既定Catalogのslug。ファイル名は `<slug>.json`。
pub const DEFAULT_SLUG: &str = "library_data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Catalogファイルを置くディレクトリ（shelf）
    pub data_dir: PathBuf,
    /// 起動時に選択しておくCatalog
    pub default_slug: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::resolve(std::env::args().nth(1), std::env::var(DATA_DIR_ENV).ok())
    }

    fn resolve(arg: Option<String>, env: Option<String>) -> Self {
        let present = |s: &String| !s.trim().is_empty();
        let data_dir = arg
            .filter(present)
            .or(env.filter(present))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Self {
            data_dir,
            default_slug: DEFAULT_SLUG.to_string(),
        }
    }
}
