use indexmap::IndexSet;

use crate::chunk::{AsmFile, Chunk, Constant, MacroDef};

/// Nesting limit for macro-in-macro expansion. Self-referential input stops
/// expanding here and passes the offending line through verbatim.
const MAX_EXPANSION_DEPTH: usize = 64;

/// Macro/constant lookup scope for one import session.
///
/// A session collects the files already imported ("includes") and resolves
/// names against them: case-insensitive, unioned across includes in the
/// order they were added, first definition wins. Create one session per
/// import and drop it when the session ends; nothing persists past the
/// value itself, so independent imports never share resolution state.
#[derive(Debug, Default)]
pub struct Session<'a> {
    includes: Vec<&'a AsmFile>,
    known_names: IndexSet<String>,
}

impl<'a> Session<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_includes(includes: impl IntoIterator<Item = &'a AsmFile>) -> Self {
        let mut session = Self::new();
        for file in includes {
            session.add_include(file);
        }
        session
    }

    pub fn add_include(&mut self, file: &'a AsmFile) {
        self.includes.push(file);
    }

    /// Registers macro names the classifier should recognize as invocations
    /// even without a definition in scope. Level-script and sprite-layout
    /// macros are provided by the runtime rather than the source being
    /// imported, so their callsites still have to classify as invocations.
    pub fn register_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.known_names.insert(name.as_ref().to_ascii_lowercase());
        }
    }

    pub fn includes(&self) -> &[&'a AsmFile] {
        &self.includes
    }

    /// Case-insensitive macro lookup across all includes, first match wins.
    pub fn resolve_macro(&self, name: &str) -> Option<&'a MacroDef> {
        self.includes
            .iter()
            .find_map(|file| file.macro_named(name))
    }

    /// Case-insensitive constant lookup across all includes, first match
    /// wins.
    pub fn resolve_constant(&self, name: &str) -> Option<Constant<'a>> {
        self.includes
            .iter()
            .find_map(|file| file.constant_named(name))
    }

    /// Whether an invocation of `name` should be recognized.
    pub fn knows_macro(&self, name: &str) -> bool {
        self.known_names.contains(&name.to_ascii_lowercase())
            || self.resolve_macro(name).is_some()
    }

    /// Expands a macro body with the given arguments into plain source
    /// lines. Named parameters substitute on identifier boundaries,
    /// positional `\N` references substitute by argument index, and nested
    /// invocations of macros in scope expand recursively.
    pub fn expand(&self, def: &MacroDef, args: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        self.expand_into(def, args, 0, &mut out);
        out
    }

    fn expand_into(&self, def: &MacroDef, args: &[String], depth: usize, out: &mut Vec<String>) {
        for chunk in &def.body {
            match chunk {
                Chunk::Line(line) => {
                    out.push(substitute_line(&line.text, &def.params, args));
                }
                Chunk::Invocation(invocation) => {
                    let call_args: Vec<String> = invocation
                        .args
                        .iter()
                        .map(|arg| substitute_line(&arg.text, &def.params, args))
                        .collect();
                    match self.resolve_macro(&invocation.name) {
                        Some(target) if depth < MAX_EXPANSION_DEPTH => {
                            self.expand_into(target, &call_args, depth + 1, out);
                        }
                        _ => out.push(render_invocation(&invocation.name, &call_args)),
                    }
                }
                Chunk::Comment(comment) => out.push(format!("; {}", comment.text)),
                Chunk::Label(label) => out.push(format!("{}:", label.symbol)),
                // A definition nested in a body is scope-building, not code.
                Chunk::Macro(_) => {}
            }
        }
    }
}

fn render_invocation(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", name, args.join(","))
    }
}

/// Substitutes macro parameters in one body line. Positional references
/// (`\1`, `\2`, ...) index the argument list directly; named parameters
/// replace whole identifiers only.
fn substitute_line(line: &str, params: &[String], args: &[String]) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\\' && chars.peek().is_some_and(|next| next.is_ascii_digit()) {
            let mut digits = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_digit() {
                    digits.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            match digits.parse::<usize>() {
                Ok(index) if index >= 1 && index <= args.len() => {
                    out.push_str(&args[index - 1]);
                }
                _ => {
                    out.push('\\');
                    out.push_str(&digits);
                }
            }
        } else if ch.is_ascii_alphabetic() || ch == '_' || ch == '.' {
            let mut word = String::new();
            word.push(ch);
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' || next == '.' {
                    word.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            match params.iter().position(|param| *param == word) {
                Some(index) => out.push_str(args.get(index).map(String::as_str).unwrap_or("")),
                None => out.push_str(&word),
            }
        } else {
            out.push(ch);
        }
    }

    out
}
