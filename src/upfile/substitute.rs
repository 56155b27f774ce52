use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::upfile::ast::Upfile;

/// Passes made before a still-changing line is treated as cyclic.
pub const MAX_ROUNDS: usize = 10;

#[derive(Debug, Error, PartialEq)]
pub enum SubstituteError {
    #[error("possible cycle detected in: {0}")]
    PossibleCycle(String),
    #[error("cannot build substitution table: {0}")]
    Table(#[from] regex::Error),
}

/// A read-only view of the command table plus ephemeral pseudo-commands.
///
/// Deriving a scope never touches the parent or the shared table, so each
/// host or step can inject its own `$server` and `$checksum`.
#[derive(Clone)]
pub struct Scope<'a> {
    upfile: &'a Upfile,
    injected: Arc<Vec<(String, String)>>,
}

impl<'a> Scope<'a> {
    pub fn new(upfile: &'a Upfile) -> Self {
        Self {
            upfile,
            injected: Arc::new(Vec::new()),
        }
    }

    /// A child scope where `$name` expands to `value`.
    pub fn with_value(&self, name: &str, value: &str) -> Scope<'a> {
        let mut injected: Vec<(String, String)> = self
            .injected
            .iter()
            .filter(|(n, _)| n != name)
            .cloned()
            .collect();
        injected.push((name.to_string(), value.to_string()));
        Scope {
            upfile: self.upfile,
            injected: Arc::new(injected),
        }
    }

    /// Every `$name` → value pair visible from this scope.
    fn replacements(&self, vars: &HashMap<String, String>) -> HashMap<String, String> {
        let mut table: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (format!("${}", k), v.clone()))
            .collect();
        for (name, cmd) in &self.upfile.commands {
            if cmd.is_substitutable() {
                table.insert(format!("${}", name), cmd.as_value());
            }
        }
        for (name, value) in self.injected.iter() {
            table.insert(format!("${}", name), value.clone());
        }
        table
    }
}

/// Expand `$name` references in `line` until nothing changes.
///
/// Fails after [`MAX_ROUNDS`] passes that all changed the line, or as soon as a
/// reference expands to itself, which happens when a command refers back to
/// itself directly or through others.
pub fn substitute(
    vars: &HashMap<String, String>,
    scope: &Scope,
    line: &str,
) -> Result<String, SubstituteError> {
    let table = scope.replacements(vars);
    if table.is_empty() {
        return Ok(line.to_string());
    }

    // Longest keys first so `$remote_user` is not eaten by `$remote`.
    let mut keys: Vec<&String> = table.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let pattern = keys
        .iter()
        .map(|k| regex::escape(k))
        .collect::<Vec<_>>()
        .join("|");
    let re = Regex::new(&pattern)?;

    let mut current = line.to_string();
    for _ in 0..MAX_ROUNDS {
        let next = re
            .replace_all(&current, |caps: &regex::Captures| table[&caps[0]].clone())
            .into_owned();
        if next == current {
            // A match that expands to itself is a direct self-reference.
            if re.is_match(&current) {
                break;
            }
            return Ok(current);
        }
        current = next;
    }
    Err(SubstituteError::PossibleCycle(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upfile::parse;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_runtime_variable() {
        let up = parse("a\n\techo $NAME\n").unwrap();
        let scope = Scope::new(&up);
        let out = substitute(&vars(&[("NAME", "world")]), &scope, "echo $NAME").unwrap();
        assert_eq!(out, "echo world");
    }

    #[test]
    fn test_guard_free_command_is_a_value() {
        let up = parse("deploy\n\tssh $remote true\n\nremote\n\t$USER@$server\n").unwrap();
        let scope = Scope::new(&up).with_value("server", "10.0.0.1");
        let out = substitute(&vars(&[("USER", "ops")]), &scope, "ssh $remote true").unwrap();
        assert_eq!(out, "ssh ops@10.0.0.1 true");
    }

    #[test]
    fn test_multi_line_value_joined_by_newline() {
        let up = parse("deploy\n\t$steps\n\nsteps\n\techo 1\n\techo 2\n").unwrap();
        let out = substitute(&HashMap::new(), &Scope::new(&up), "$steps").unwrap();
        assert_eq!(out, "echo 1\necho 2");
    }

    #[test]
    fn test_guarded_command_is_not_substituted() {
        let up = parse("deploy\n\techo $guarded\n\nguarded check\n\techo no\n\ncheck\n\ttrue\n").unwrap();
        let out = substitute(&HashMap::new(), &Scope::new(&up), "echo $guarded").unwrap();
        assert_eq!(out, "echo $guarded");
    }

    #[test]
    fn test_multi_hop_converges() {
        let up = parse("a\n\t$b\n\nb\n\t$c\n\nc\n\t$d\n\nd\n\tdone\n").unwrap();
        let out = substitute(&HashMap::new(), &Scope::new(&up), "echo $a").unwrap();
        assert_eq!(out, "echo done");
    }

    #[test]
    fn test_direct_cycle() {
        let up = parse("a\n\techo $a\n").unwrap();
        let err = substitute(&HashMap::new(), &Scope::new(&up), "$a").unwrap_err();
        assert_eq!(err, SubstituteError::PossibleCycle("$a".to_string()));
    }

    #[test]
    fn test_body_that_is_only_itself() {
        let up = parse("x\n\t$x\n").unwrap();
        let err = substitute(&HashMap::new(), &Scope::new(&up), "test -f $x").unwrap_err();
        assert_eq!(err, SubstituteError::PossibleCycle("test -f $x".to_string()));
    }

    #[test]
    fn test_variable_equal_to_its_name() {
        let up = parse("a\n\ttrue\n").unwrap();
        let v = vars(&[("HOME", "$HOME")]);
        assert!(substitute(&v, &Scope::new(&up), "cd $HOME").is_err());
    }

    #[test]
    fn test_transitive_cycle() {
        let up = parse("a\n\t$b\n\nb\n\t$a x\n").unwrap();
        assert!(substitute(&HashMap::new(), &Scope::new(&up), "$a").is_err());
    }

    #[test]
    fn test_longest_key_wins() {
        let up = parse("a\n\ttrue\n").unwrap();
        let v = vars(&[("remote", "short"), ("remote_user", "long")]);
        let out = substitute(&v, &Scope::new(&up), "$remote_user $remote").unwrap();
        assert_eq!(out, "long short");
    }

    #[test]
    fn test_injected_value_shadows_command_and_var() {
        let up = parse("a\n\ttrue\n\nserver\n\tfrom-upfile\n").unwrap();
        let v = vars(&[("server", "from-env")]);
        let scope = Scope::new(&up);
        assert_eq!(substitute(&v, &scope, "$server").unwrap(), "from-upfile");
        let host = scope.with_value("server", "1.2.3.4");
        assert_eq!(substitute(&v, &host, "$server").unwrap(), "1.2.3.4");
        // The parent scope is untouched.
        assert_eq!(substitute(&v, &scope, "$server").unwrap(), "from-upfile");
    }

    #[test]
    fn test_unknown_reference_left_alone() {
        let up = parse("a\n\ttrue\n").unwrap();
        let out = substitute(&HashMap::new(), &Scope::new(&up), "echo $nope").unwrap();
        assert_eq!(out, "echo $nope");
    }
}
