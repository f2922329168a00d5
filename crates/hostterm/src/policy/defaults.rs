//! Built-in allowed and blocked rule sets.
//!
//! The allowed set is read-only inspection only. Nothing on it can dump the
//! process environment (`env`, `printenv`, `echo $VAR`), since that is where
//! API keys usually live.
//!
//! The blocked set stands on its own: it is evaluated before the allowed set
//! and in every permission mode, so each rule here must be safe to enforce
//! even when the caller has switched to `allow_all`.

use super::pattern::CommandPattern;

const ALLOWED: &[(&str, &str)] = &[
    // Filesystem inspection
    ("ls", "List directory contents"),
    ("pwd", "Print working directory"),
    ("cat ", "Print file contents"),
    ("head ", "Print the start of a file"),
    ("tail ", "Print the end of a file"),
    ("less ", "Page through a file"),
    ("wc ", "Count lines, words and bytes"),
    ("file ", "Identify file type"),
    ("stat ", "Show file metadata"),
    ("tree", "Show a directory tree"),
    ("du", "Show disk usage"),
    ("df", "Show free disk space"),
    ("realpath ", "Resolve a path"),
    ("basename ", "Strip directory from a path"),
    ("dirname ", "Strip file name from a path"),
    // Searching
    ("find ", "Find files"),
    ("grep ", "Search file contents"),
    ("rg ", "Search file contents (ripgrep)"),
    ("which ", "Locate a command"),
    // Text processing
    ("sort ", "Sort lines"),
    ("uniq ", "Filter repeated lines"),
    ("cut ", "Select columns"),
    ("diff ", "Compare files"),
    // System information
    ("ps", "List processes"),
    ("whoami", "Print current user"),
    ("hostname", "Print host name"),
    ("uname", "Print system information"),
    ("uptime", "Show uptime"),
    ("date", "Print the date"),
    // Version control (read-only)
    ("git status", "Git status"),
    ("git log", "Git history"),
    ("git diff", "Git diff"),
    ("git show", "Git show"),
    ("git branch", "Git branches"),
    ("git remote -v", "Git remotes"),
    ("git rev-parse", "Git revision lookup"),
    // Toolchain version probes
    ("python --version", "Python version"),
    ("python3 --version", "Python version"),
    ("node --version", "Node.js version"),
    ("npm --version", "npm version"),
    ("cargo --version", "Cargo version"),
    ("rustc --version", "Rust compiler version"),
    ("go version", "Go version"),
];

const PRIVILEGE: &str = "Privilege escalation is not allowed";
const FORMAT: &str = "Formatting filesystems is not allowed";
const DD: &str = "Raw disk copies with dd are not allowed";
const POWER: &str = "Shutting down or rebooting the system is not allowed";
const FIND_EXEC: &str = "find -exec/-execdir runs arbitrary commands and is not allowed. \
                         Pipe the results to xargs instead, e.g. find . -name '*.tmp' | xargs rm";
const FIND_OK: &str = "find -ok/-okdir runs arbitrary commands and is not allowed. \
                       Pipe the results to xargs instead";
const SENSITIVE_FILE: &str = "Access to system account and credential databases is not \
                              allowed, whichever command is used to read them";
const SENSITIVE_DIR: &str = "Access to SSH keys, cloud credentials and GPG keyrings is not \
                             allowed, whichever command is used to read them";

/// Rules that look for a command name at the start of a command also look
/// after `;`, `&`, `|` and line breaks. They are all compiled with `(?m)` so
/// `^` matches at the start of every line.
///
/// Recursive+force delete of `/`, `/*`, `.`, `..`, `~` or `*`, with the
/// flags combined (`-rf`, `-fr`, `-Rf`), split (`-r -f`) or spelled long
/// (`--recursive --force`) in either order.
const RM_RECURSIVE_FORCE: &str = concat!(
    r"(?m)(^|[;&|\n]\s*)rm\s+(-\S*\s+)*",
    r"(-[a-zA-Z]*([rR][a-zA-Z]*f|f[a-zA-Z]*[rR])[a-zA-Z]*",
    r"|(-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)\s+(-\S*\s+)*(-[a-zA-Z]*f[a-zA-Z]*|--force)",
    r"|(-[a-zA-Z]*f[a-zA-Z]*|--force)\s+(-\S*\s+)*(-[a-zA-Z]*[rR][a-zA-Z]*|--recursive))",
    r"\s+(-\S*\s+)*(--\s+)?(/\*?|\.\.?/?|~/?|\*)(\s|$)",
);

/// Redirection or `tee` into a whole block device, across SCSI/SATA, IDE,
/// virtio, Xen, NVMe, eMMC and macOS naming.
const BLOCK_DEVICE_WRITE: &str =
    r"(>|\btee\s+(-\S+\s+)*)\s*/dev/(sd[a-z]|hd[a-z]|vd[a-z]|xvd[a-z]|nvme\d|mmcblk\d|disk\d)";

const SENSITIVE_FILE_PATHS: &str = r"/etc/(shadow|gshadow|passwd|master\.passwd|sudoers)\b";

const SENSITIVE_DIR_PATHS: &str =
    r#"(^|[\s/'"=:])\.(ssh|aws|gnupg|azure)(/|\s|$|['"])|\.config/gcloud(/|\s|$)"#;

/// The default allowed rules.
pub fn default_allowed_commands() -> Vec<CommandPattern> {
    ALLOWED
        .iter()
        .map(|(pattern, description)| CommandPattern::literal(*pattern, *description))
        .collect()
}

/// The default blocked rules.
pub fn default_blocked_commands() -> Vec<CommandPattern> {
    vec![
        // Privilege escalation
        CommandPattern::literal("sudo ", PRIVILEGE),
        CommandPattern::regex(r"(?m)(^|[;&|(\n]\s*)(sudo|doas|su)(\s|$)", PRIVILEGE),
        // Filesystem formatting and raw devices
        CommandPattern::literal("mkfs", FORMAT),
        CommandPattern::regex(
            r"(?m)(^|[;&|\n]\s*)(mkfs(\.\w+)?|mke2fs|wipefs)(\s|$)",
            FORMAT,
        ),
        CommandPattern::literal("dd", DD),
        CommandPattern::regex(r"(?m)(^|[;&|\n]\s*)dd(\s|$)", DD),
        CommandPattern::regex(
            BLOCK_DEVICE_WRITE,
            "Writing directly to a block device is not allowed",
        ),
        // Power state
        CommandPattern::literal("shutdown", POWER),
        CommandPattern::literal("reboot", POWER),
        CommandPattern::literal("halt", POWER),
        CommandPattern::literal("poweroff", POWER),
        CommandPattern::regex(
            r"(?m)(^|[;&|\n]\s*)(shutdown|reboot|halt|poweroff|(init|telinit)\s+[06]|systemctl\s+(poweroff|reboot|halt|kexec))(\s|$)",
            POWER,
        ),
        // Process termination
        CommandPattern::literal("kill", "Killing processes is not allowed"),
        CommandPattern::literal("killall", "Killing processes by name is not allowed"),
        CommandPattern::literal("pkill", "Killing processes by pattern is not allowed"),
        CommandPattern::regex(
            r"(?m)(^|[;&|\n]\s*)(kill|killall|pkill)(\s|$)",
            "Killing processes is not allowed",
        ),
        // Destructive deletes
        CommandPattern::regex(
            RM_RECURSIVE_FORCE,
            "Recursive force delete of /, ~, . or .. is not allowed",
        ),
        CommandPattern::regex(
            r"(?m)(^|[;&|\n]\s*)rm\s.*--no-preserve-root",
            "rm --no-preserve-root is not allowed",
        ),
        CommandPattern::regex(
            r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
            "Fork bombs are not allowed",
        ),
        // Command injection through find
        CommandPattern::regex(r"(?m)^find\s+.*-exec", FIND_EXEC),
        CommandPattern::regex(r"(?m)^find\s+.*\s-ok(dir)?(\s|$)", FIND_OK),
        CommandPattern::regex(r"[;&|(]\s*find\s+.*-exec", FIND_EXEC),
        CommandPattern::regex(r"[;&|(]\s*find\s+.*\s-ok(dir)?(\s|$)", FIND_OK),
        // Credentials, independent of the reading command
        CommandPattern::regex(SENSITIVE_FILE_PATHS, SENSITIVE_FILE),
        CommandPattern::regex(SENSITIVE_DIR_PATHS, SENSITIVE_DIR),
    ]
}
