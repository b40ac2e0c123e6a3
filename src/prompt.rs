use crate::env::Environment;
use nix::unistd::{self, User};

/// Used when `PS1` is not set. `\u` is the user name, `\h` the host name and
/// `\b` the basename of the working directory. The leading newline separates
/// the prompt from the previous command's output.
pub(crate) const DEFAULT_TEMPLATE: &str = "\n\\u@\\h : \\b\n";

/// What a prompt template can refer to. Unavailable facts expand to nothing.
#[derive(Debug, Default)]
pub(crate) struct PromptFacts {
    pub user: Option<String>,
    pub host: Option<String>,
    pub dir: Option<String>,
    pub is_root: bool,
}

impl PromptFacts {
    pub fn gather(env: &Environment) -> Self {
        let uid = unistd::getuid();
        PromptFacts {
            user: User::from_uid(uid).ok().flatten().map(|u| u.name),
            host: unistd::gethostname()
                .ok()
                .map(|h| h.to_string_lossy().into_owned()),
            dir: env
                .current_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .or_else(|| Some(env.current_dir.display().to_string())),
            is_root: uid.is_root(),
        }
    }
}

/// The prompt to show before reading the next line.
///
/// `PS1` is used verbatim when set.
pub(crate) fn render(env: &Environment) -> String {
    match env.get_var("PS1") {
        Some(ps1) => ps1,
        None => expand(DEFAULT_TEMPLATE, &PromptFacts::gather(env)),
    }
}

/// Expand `\u`, `\h` and `\b` in `template` and append the `$ `/`# ` sigil.
pub(crate) fn expand(template: &str, facts: &PromptFacts) -> String {
    let mut out = String::new();
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let fact = match chars.next() {
            Some('u') => &facts.user,
            Some('h') => &facts.host,
            Some('b') => &facts.dir,
            // Unknown escapes vanish.
            _ => continue,
        };
        if let Some(value) = fact {
            out.push_str(value);
        }
    }
    out.push_str(if facts.is_root { "# " } else { "$ " });
    out
}
