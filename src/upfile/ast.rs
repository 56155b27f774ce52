use std::collections::HashMap;

/// A named unit of work.
///
/// `execs` run in order when any of the `exec_ifs` guards exit non-zero, or
/// unconditionally when there are no guards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cmd {
    pub exec_ifs: Vec<String>,
    pub execs: Vec<String>,
}

impl Cmd {
    /// Guard-free commands double as substitution values.
    pub fn is_substitutable(&self) -> bool {
        self.exec_ifs.is_empty()
    }

    /// The value `$name` expands to: every exec line joined by newlines.
    pub fn as_value(&self) -> String {
        self.execs.join("\n").trim().to_string()
    }
}

/// A parsed Upfile. Read-only once the parser hands it out.
#[derive(Debug, Clone, PartialEq)]
pub struct Upfile {
    pub commands: HashMap<String, Cmd>,
    /// Name of the first command in the file.
    pub default_command: String,
}

impl Upfile {
    pub fn get(&self, name: &str) -> Option<&Cmd> {
        self.commands.get(name)
    }

    /// Command names with the default first, the rest sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .commands
            .keys()
            .map(String::as_str)
            .filter(|n| *n != self.default_command)
            .collect();
        names.sort_unstable();
        names.insert(0, &self.default_command);
        names
    }

    /// Render back to Upfile text. Parsing the output yields an equal table.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        for name in self.names() {
            let cmd = &self.commands[name];
            out.push_str(name);
            for guard in &cmd.exec_ifs {
                out.push(' ');
                out.push_str(guard);
            }
            out.push('\n');
            for line in &cmd.execs {
                out.push('\t');
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}
