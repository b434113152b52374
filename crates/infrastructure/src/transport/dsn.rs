use std::collections::BTreeMap;

use crontask_core::{SchedulerError, SchedulerResult};

const GROUP_SEPARATOR: &str = "&&";

/// Transport连接串
///
/// - 单一后端：`scheme://host/path?option=value`，例如 `memory://batch`、`sqlite:///var/tasks.db`
/// - 组合后端：`scheme://(A && B)?option=value`，成员可以继续嵌套
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dsn {
    Single {
        scheme: String,
        host: String,
        path: Option<String>,
        options: BTreeMap<String, String>,
        raw: String,
    },
    Composite {
        scheme: String,
        members: Vec<Dsn>,
        options: BTreeMap<String, String>,
    },
}

impl Dsn {
    pub fn parse(dsn: &str) -> SchedulerResult<Self> {
        let dsn = dsn.trim();
        if dsn.is_empty() {
            return Err(invalid(dsn, "连接串为空"));
        }

        let Some((scheme, rest)) = dsn.split_once("://") else {
            // sqlx 风格的 sqlite::memory: / sqlite:tasks.db
            if let Some(rest) = dsn.strip_prefix("sqlite:") {
                return Ok(Dsn::Single {
                    scheme: "sqlite".to_string(),
                    host: String::new(),
                    path: Some(rest.to_string()),
                    options: BTreeMap::new(),
                    raw: dsn.to_string(),
                });
            }
            return Err(invalid(dsn, "缺少协议"));
        };

        if scheme.is_empty() {
            return Err(invalid(dsn, "缺少协议"));
        }

        if let Some(group) = rest.strip_prefix('(') {
            let close = matching_paren(group).ok_or_else(|| invalid(dsn, "括号不匹配"))?;
            let inner = &group[..close];
            let tail = &group[close + 1..];

            let options = match tail {
                "" => BTreeMap::new(),
                query if query.starts_with('?') => parse_options(&query[1..]),
                _ => return Err(invalid(dsn, "组合连接串的括号后只能跟参数")),
            };

            let members = split_top_level(inner)
                .into_iter()
                .map(|member| {
                    if member.is_empty() {
                        Err(invalid(dsn, "组合连接串中存在空成员"))
                    } else {
                        Dsn::parse(member)
                    }
                })
                .collect::<SchedulerResult<Vec<_>>>()?;

            return Ok(Dsn::Composite {
                scheme: scheme.to_string(),
                members,
                options,
            });
        }

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };
        let (host, path) = match location.split_once('/') {
            Some((host, path)) => (host, Some(path.to_string())),
            None => (location, None),
        };

        Ok(Dsn::Single {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path,
            options: query.map(parse_options).unwrap_or_default(),
            raw: dsn.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        match self {
            Dsn::Single { scheme, .. } | Dsn::Composite { scheme, .. } => scheme,
        }
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        match self {
            Dsn::Single { options, .. } | Dsn::Composite { options, .. } => {
                options.get(key).map(String::as_str)
            }
        }
    }
}

fn invalid(dsn: &str, reason: &str) -> SchedulerError {
    SchedulerError::Configuration(format!("无效的Transport连接串 {dsn}: {reason}"))
}

/// 返回与开头 `(` 匹配的 `)` 在 `group` 中的位置
fn matching_paren(group: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (index, ch) in group.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
    }
    None
}

/// 只在最外层按 `&&` 切分
fn split_top_level(inner: &str) -> Vec<&str> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let bytes = inner.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        match bytes[index] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'&' if depth == 0 && inner[index..].starts_with(GROUP_SEPARATOR) => {
                members.push(inner[start..index].trim());
                index += GROUP_SEPARATOR.len();
                start = index;
                continue;
            }
            _ => {}
        }
        index += 1;
    }
    members.push(inner[start..].trim());
    members
}

fn parse_options(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single() {
        let dsn = Dsn::parse("memory://batch?foo=bar").unwrap();
        match dsn {
            Dsn::Single { scheme, host, path, options, .. } => {
                assert_eq!(scheme, "memory");
                assert_eq!(host, "batch");
                assert!(path.is_none());
                assert_eq!(options.get("foo").map(String::as_str), Some("bar"));
            }
            other => panic!("unexpected dsn: {other:?}"),
        }

        assert_eq!(Dsn::parse("sqlite::memory:").unwrap().scheme(), "sqlite");
    }

    #[test]
    fn test_parse_composite() {
        let dsn = Dsn::parse("failover://(memory://first_in_first_out && sqlite::memory:)?mode=normal")
            .unwrap();

        assert_eq!(dsn.scheme(), "failover");
        assert_eq!(dsn.option("mode"), Some("normal"));
        match dsn {
            Dsn::Composite { members, .. } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].scheme(), "memory");
                assert_eq!(members[1].scheme(), "sqlite");
            }
            other => panic!("unexpected dsn: {other:?}"),
        }
    }

    #[test]
    fn test_parse_nested() {
        let dsn = Dsn::parse("rr://(failover://(memory://batch && memory://nice) && lt://(memory:// && memory://))")
            .unwrap();

        match dsn {
            Dsn::Composite { members, .. } => {
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].scheme(), "failover");
                assert_eq!(members[1].scheme(), "lt");
            }
            other => panic!("unexpected dsn: {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(Dsn::parse("").is_err());
        assert!(Dsn::parse("memory").is_err());
        assert!(Dsn::parse("failover://(memory://batch && memory://nice").is_err());
        assert!(Dsn::parse("failover://(memory://batch && )").is_err());
    }
}
