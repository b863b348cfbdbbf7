use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

/// 文字列を日付型に変換するヘルパー関数
///
/// `dateparser`クレートを利用して、様々な形式の日付文字列を解析し、
/// `DateTime<Utc>`型に変換する。
///
/// **この関数の意義**
/// `dateparser::parse`で行われないwith_timezoneでUTCへの変換を行なってる。
/// また`dateparser::parse`で対応できない文字列が来た場合でも、問題をこの関数で吸収できる。
///
/// # サポート形式の例
/// - "2025-01-15"
/// - "2025-01-15T10:00:00Z"
/// - "2025-01-15T19:00:00+09:00"
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    // `dateparser`はタイムゾーンを持つ`DateTime`を返すため、UTCに変換する
    match dateparser::parse(date_str) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => Err(anyhow!("不正な日付形式: {}", date_str)),
    }
}
