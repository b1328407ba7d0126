//! Pattern based extraction of contract dates and party details.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static EXPIRATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:expiration date|expires(?: on)?|end date|termination date):?\s*(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
    )
    .expect("expiration pattern is valid")
});

static COMPANY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*company(?:\s+name)?\s*:\s*(.+?)\s*$").expect("company pattern is valid")
});

static ADDRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*address\s*:\s*(.+?)\s*$").expect("address pattern is valid")
});

/// 找出文字中所有到期相關日期 (比對前先轉小寫)，無法解析的日期直接略過
pub fn find_expiration_dates(text: &str) -> Vec<NaiveDate> {
    let lowered = text.to_lowercase();
    EXPIRATION_PATTERN
        .captures_iter(&lowered)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| {
            let parsed = parse_contract_date(m.as_str());
            if parsed.is_none() {
                tracing::debug!("Skipping unparseable contract date '{}'", m.as_str());
            }
            parsed
        })
        .collect()
}

/// 支援 M/D/YYYY、M-D-YYYY、兩位數年份 (視為 20YY) 以及 ISO YYYY-MM-DD
pub fn parse_contract_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    if let Some((year, rest)) = raw.split_once('-') {
        if year.len() == 4 {
            let (month, day) = rest.split_once('-')?;
            return NaiveDate::from_ymd_opt(
                year.parse().ok()?,
                month.parse().ok()?,
                day.parse().ok()?,
            );
        }
    }

    let separator = if raw.contains('/') { '/' } else { '-' };
    let parts: Vec<&str> = raw.split(separator).collect();
    let [month, day, year] = parts.as_slice() else {
        return None;
    };

    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// 擷取 (公司, 地址) 配對；地址歸屬於同一段文字中最近出現的公司行
pub fn find_company_addresses(text: &str) -> Vec<(String, String)> {
    let lowered = text.to_lowercase();
    let mut current_company: Option<String> = None;
    let mut pairs = Vec::new();

    for line in lowered.lines() {
        if let Some(caps) = COMPANY_LINE.captures(line) {
            current_company = Some(caps[1].to_string());
            continue;
        }

        if let Some(caps) = ADDRESS_LINE.captures(line) {
            match &current_company {
                Some(company) => pairs.push((company.clone(), caps[1].to_string())),
                None => tracing::debug!("Address '{}' has no preceding company line", &caps[1]),
            }
        }
    }

    pairs
}

/// 只回傳公司名稱 (含沒有地址的公司)
pub fn find_companies(text: &str) -> Vec<String> {
    text.to_lowercase()
        .lines()
        .filter_map(|line| COMPANY_LINE.captures(line).map(|caps| caps[1].to_string()))
        .collect()
}
