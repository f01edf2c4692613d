//! Shaping of raw model output into the final reply
//!
//! A state-free pipeline: empty-fallback, greeting/markdown sanitation,
//! then trigger scanning. Trigger phrases are configuration data rather
//! than inline literals so tests can substitute minimal sets.

use once_cell::sync::Lazy;
use regex::Regex;

/// Reply used whenever the model produced nothing usable.
pub const FALLBACK_MESSAGE: &str = "Untuk hal itu saya perlu konfirmasi langsung dengan tim. \
     Bisa klik tombol WhatsApp admin Jokipremium di website ya 😊";

/// Fixed reply for sessions already marked done.
pub const CLOSING_MESSAGE: &str =
    "Terima kasih, silakan lanjut isi form di website Jokipremium ya 😊";

/// Greeting shapes the model may open with even when told not to.
static GREETING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^selamat\s+(pagi|siang|sore|malam)",
        r"(?i)^(halo|hai|assalamu['`’]alaikum|assalamualaikum|hi)\b",
        r"(?i)^saya\s+minjo\b",
        r"(?i)^perkenalkan\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("greeting pattern"))
    .collect()
});

static MD_BOLD_STARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(\S(?:.*?\S)?)\*\*").expect("markdown pattern"));
static MD_BOLD_UNDERSCORES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__(\S(?:.*?\S)?)__").expect("markdown pattern"));
static MD_ITALIC_STAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*(\S(?:.*?\S)?)\*").expect("markdown pattern"));
static MD_ITALIC_UNDERSCORE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\S(?:.*?\S)?)_").expect("markdown pattern"));

/// Substring trigger phrases, matched case-insensitively against the
/// sanitized reply. `whatsapp` appends the handoff template; `end` marks
/// the session terminal.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    pub whatsapp: Vec<String>,
    pub end: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            whatsapp: [
                "klik tombol whatsapp",
                "hubungi whatsapp",
                "whatsapp admin",
                "konfirmasi langsung dengan tim",
            ]
            .map(String::from)
            .to_vec(),
            end: [
                "silakan isi form di website jokipremium",
                "silakan isi form di website",
                "silakan isi form jokipremium",
                "silakan isi form di halaman website jokipremium",
                "silakan isi form di halaman website",
                "silakan lanjut isi form di website jokipremium",
                "silakan lanjut isi form di website",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

/// The shaped reply plus the side effects the orchestrator must apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedReply {
    pub text: String,
    pub whatsapp_appended: bool,
    /// The reply directed the user to the form; the session becomes terminal.
    pub terminate: bool,
}

/// Convert `**bold**`, `__bold__`, `*italic*` and `_italic_` to plain text.
pub fn strip_markdown_emphasis(text: &str) -> String {
    let text = MD_BOLD_STARS.replace_all(text, "$1");
    let text = MD_BOLD_UNDERSCORES.replace_all(&text, "$1");
    let text = MD_ITALIC_STAR.replace_all(&text, "$1");
    MD_ITALIC_UNDERSCORE.replace_all(&text, "$1").into_owned()
}

/// Sanitize one assistant reply.
///
/// When a greeting is not allowed, the first non-blank line is dropped if it
/// matches a greeting pattern, so the visible reply never opens with one even
/// if the model ignored the instruction. Returns an empty string when nothing
/// survives; the caller substitutes the fallback.
pub fn sanitize_reply(text: &str, allow_greeting: bool) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if allow_greeting {
        return strip_markdown_emphasis(trimmed);
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();

    let first_content = lines.iter().position(|l| !l.trim().is_empty());
    if let Some(idx) = first_content {
        let first_line = lines[idx].trim_start();
        if GREETING_PATTERNS.iter().any(|re| re.is_match(first_line)) {
            lines.remove(idx);
        }
    }

    while lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }

    let normalized = lines.join("\n").trim().to_string();
    if normalized.is_empty() {
        normalized
    } else {
        strip_markdown_emphasis(&normalized)
    }
}

fn whatsapp_template(analysis: &str) -> String {
    format!(
        "\n\nBerikut template pesan WhatsApp yang bisa langsung kamu kirim ke admin Jokipremium:\n\
         \n\
         ---\n\
         Halo admin Jokipremium 👋\n\
         Saya sudah berdiskusi dengan AI Assistant Jokipremium (Minjo) dan diarahkan lanjut ke WhatsApp.\n\
         \n\
         1. Kebutuhan saya:\n   (apa yang saya inginkan / minta dibantu)\n\
         2. Kenapa diteruskan ke admin:\n   (AI bilang kasus ini perlu bantuan tim langsung)\n\
         3. Catatan analisa AI:\n   (ringkasnya seperti ini)\n   {analysis}\n\
         4. Saran lanjutan dari AI:\n   (mohon dibantu lanjutkan diskusinya, termasuk scope yang realistis, \
         estimasi pengerjaan, dan arah teknis berikutnya)\n\
         ---\n\
         \n\
         Silakan kirim template ini lewat tombol WhatsApp di website ya 😊"
    )
}

/// Run the full shaping pipeline over one raw model reply.
///
/// `history_snippet` is the session's rendered history; the WhatsApp template
/// embeds its last 6 lines as an analysis summary. Termination is detected on
/// the sanitized text before any template is appended.
pub fn shape_reply(
    raw: &str,
    should_greet: bool,
    history_snippet: &str,
    triggers: &TriggerConfig,
) -> ShapedReply {
    let mut text = raw.trim().to_string();
    if text.is_empty() {
        text = FALLBACK_MESSAGE.to_string();
    }

    text = sanitize_reply(&text, should_greet);
    if text.is_empty() {
        text = FALLBACK_MESSAGE.to_string();
    }

    let lowered = text.to_lowercase();
    let whatsapp_appended = triggers.whatsapp.iter().any(|t| lowered.contains(t.as_str()));
    let terminate = triggers.end.iter().any(|t| lowered.contains(t.as_str()));

    if whatsapp_appended {
        let lines: Vec<&str> = history_snippet.lines().collect();
        let start = lines.len().saturating_sub(6);
        let analysis = lines[start..].join("\n");
        text.push_str(&whatsapp_template(&analysis));
    }

    ShapedReply {
        text,
        whatsapp_appended,
        terminate,
    }
}
