//! Bundled rule pack
//!
//! The `core` pack ships compiled into the library so the engine detects
//! out of the box with no files on disk. It sits at the lowest precedence
//! rank; community and custom packs shadow any rule id they redefine.

use once_cell::sync::Lazy;
use raxe_core::{Pattern, Rule, RuleFamily, Severity};
use std::sync::Arc;

/// Name of the bundled pack
pub const BUNDLED_PACK_NAME: &str = "core";

/// The bundled rule set, built once per process
pub static BUNDLED_RULES: Lazy<Vec<Arc<Rule>>> = Lazy::new(|| {
    build_bundled_rules().into_iter().map(Arc::new).collect()
});

fn build_bundled_rules() -> Vec<Rule> {
    let mut rules = Vec::new();

    // -- Prompt injection -------------------------------------------------

    rules.push(
        Rule::new(
            "pi-001",
            "Instruction override",
            RuleFamily::Pi,
            Severity::Critical,
            0.9,
            vec![Pattern::insensitive(
                r"(?:ignore|disregard|forget)\s+(?:all\s+|any\s+)?(?:previous|prior|above|earlier)\s+(?:instructions|prompts|rules|directions|context)",
            )],
        )
        .with_subfamily("instruction_override")
        .with_risk("The prompt attempts to cancel the instructions the model was given")
        .with_remediation("Reject the prompt or strip the override clause before forwarding")
        .with_attack_ids(vec!["T1566".to_string()]),
    );

    rules.push(
        Rule::new(
            "pi-002",
            "System prompt extraction",
            RuleFamily::Pi,
            Severity::High,
            0.85,
            vec![Pattern::insensitive(
                r"(?:reveal|show|print|output|repeat|display)\s+(?:me\s+)?(?:your|the)\s+(?:system\s+prompt|instructions|initial\s+prompt|hidden\s+prompt)",
            )],
        )
        .with_subfamily("prompt_extraction")
        .with_risk("The prompt tries to exfiltrate the system prompt"),
    );

    rules.push(
        Rule::new(
            "pi-003",
            "Instruction replacement",
            RuleFamily::Pi,
            Severity::High,
            0.8,
            vec![Pattern::insensitive(
                r"(?:new|updated|real|actual)\s+instructions\s*[:\-]|your\s+(?:new|real)\s+(?:task|goal|purpose)\s+is",
            )],
        )
        .with_subfamily("instruction_replacement"),
    );

    rules.push(
        Rule::new(
            "pi-004",
            "Delimiter context break",
            RuleFamily::Pi,
            Severity::Medium,
            0.6,
            vec![Pattern::insensitive(
                r"(?:```|---|===|\[/?(?:INST|SYS|SYSTEM)\])\s*(?:system|assistant)\s*[:\]]",
            )],
        )
        .with_subfamily("delimiter_attack"),
    );

    // -- Jailbreak --------------------------------------------------------

    rules.push(
        Rule::new(
            "jb-001",
            "Persona jailbreak",
            RuleFamily::Jb,
            Severity::High,
            0.85,
            vec![Pattern::insensitive(
                r"\b(?:DAN|do\s+anything\s+now)\b|developer\s+mode|jailbreak(?:ed|ing)?\s+(?:mode|prompt)|evil\s+(?:twin|assistant)",
            )],
        )
        .with_subfamily("persona"),
    );

    rules.push(
        Rule::new(
            "jb-002",
            "Role-play coercion",
            RuleFamily::Jb,
            Severity::Medium,
            0.7,
            vec![Pattern::insensitive(
                r"(?:pretend|act\s+as\s+if|imagine)\s+(?:you\s+(?:are|have)|there\s+are)\s+no\s+(?:rules|restrictions|filters|guidelines|limitations)",
            )],
        )
        .with_subfamily("roleplay"),
    );

    rules.push(
        Rule::new(
            "jb-003",
            "Safety bypass request",
            RuleFamily::Jb,
            Severity::High,
            0.8,
            vec![Pattern::insensitive(
                r"(?:bypass|disable|turn\s+off|remove|without)\s+(?:your\s+)?(?:safety|content|ethical)\s+(?:filters?|guidelines|checks|restrictions)",
            )],
        )
        .with_subfamily("safety_bypass"),
    );

    // -- PII / data extraction --------------------------------------------

    rules.push(
        Rule::new(
            "pii-001",
            "US social security number",
            RuleFamily::Pii,
            Severity::High,
            0.85,
            vec![Pattern::new(r"\b\d{3}-\d{2}-\d{4}\b")],
        )
        .with_subfamily("ssn")
        .with_remediation("Redact the number before the text leaves the trust boundary"),
    );

    rules.push(
        Rule::new(
            "pii-002",
            "Payment card number",
            RuleFamily::Pii,
            Severity::High,
            0.75,
            vec![Pattern::new(
                r"\b(?:4\d{3}|5[1-5]\d{2}|3[47]\d{2}|6011)[ -]?\d{4}[ -]?\d{4}[ -]?\d{2,4}\b",
            )],
        )
        .with_subfamily("credit_card"),
    );

    rules.push(
        Rule::new(
            "pii-003",
            "Email address disclosure",
            RuleFamily::Pii,
            Severity::Medium,
            0.6,
            vec![Pattern::new(
                r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            )],
        )
        .with_subfamily("email"),
    );

    rules.push(
        Rule::new(
            "pii-004",
            "Credential material",
            RuleFamily::Pii,
            Severity::Critical,
            0.9,
            vec![
                Pattern::new(r"\b(?:sk|pk)-[A-Za-z0-9]{20,}\b"),
                Pattern::new(r"\bAKIA[0-9A-Z]{16}\b"),
                Pattern::insensitive(r"-----BEGIN\s+(?:RSA\s+|EC\s+|OPENSSH\s+)?PRIVATE\s+KEY-----"),
            ],
        )
        .with_subfamily("secrets"),
    );

    // -- Command / code injection -----------------------------------------

    rules.push(
        Rule::new(
            "cmd-001",
            "Destructive shell command",
            RuleFamily::Cmd,
            Severity::Critical,
            0.9,
            vec![Pattern::insensitive(
                r"\brm\s+-[rf]{1,2}\b|\bmkfs(?:\.\w+)?\b|\bdd\s+if=|:\(\)\s*\{\s*:\|:&\s*\}",
            )],
        )
        .with_subfamily("destructive")
        .with_attack_ids(vec!["T1059".to_string()]),
    );

    rules.push(
        Rule::new(
            "cmd-002",
            "Command substitution",
            RuleFamily::Cmd,
            Severity::High,
            0.75,
            vec![Pattern::new(r"\$\((?:[^)]{1,200})\)|`[^`]{1,200}`\s*;")],
        )
        .with_subfamily("substitution")
        .with_attack_ids(vec!["T1059".to_string()]),
    );

    rules.push(
        Rule::new(
            "cmd-003",
            "Dynamic code evaluation",
            RuleFamily::Cmd,
            Severity::High,
            0.8,
            vec![Pattern::insensitive(
                r"\b(?:eval|exec)\s*\(|\bos\.system\s*\(|subprocess\.(?:run|Popen|call)\s*\(",
            )],
        )
        .with_subfamily("eval"),
    );

    // -- Encoding / obfuscation -------------------------------------------

    rules.push(
        Rule::new(
            "enc-001",
            "Base64 payload",
            RuleFamily::Enc,
            Severity::Medium,
            0.6,
            vec![Pattern::new(r"\b[A-Za-z0-9+/]{24,}={0,2}\b")],
        )
        .with_subfamily("base64")
        .with_risk("Long base64 runs often smuggle instructions past keyword filters"),
    );

    rules.push(
        Rule::new(
            "enc-002",
            "Hex-encoded payload",
            RuleFamily::Enc,
            Severity::Medium,
            0.6,
            vec![Pattern::new(r"(?:\\x[0-9a-fA-F]{2}){8,}|\b(?:0x)?[0-9a-fA-F]{32,}\b")],
        )
        .with_subfamily("hex"),
    );

    rules.push(
        Rule::new(
            "enc-003",
            "Unicode escape smuggling",
            RuleFamily::Enc,
            Severity::Medium,
            0.65,
            vec![Pattern::new(r"(?:\\u[0-9a-fA-F]{4}){6,}")],
        )
        .with_subfamily("unicode_escape"),
    );

    rules.push(
        Rule::new(
            "enc-004",
            "Decode-and-follow request",
            RuleFamily::Enc,
            Severity::High,
            0.8,
            vec![Pattern::insensitive(
                r"(?:decode|unscramble|reverse)\s+(?:this|the\s+following)\s+(?:and|then)\s+(?:follow|execute|run|obey)",
            )],
        )
        .with_subfamily("decode_execute"),
    );

    // -- Retrieval-augmented attacks --------------------------------------

    rules.push(
        Rule::new(
            "rag-001",
            "Document-embedded directive",
            RuleFamily::Rag,
            Severity::High,
            0.8,
            vec![Pattern::insensitive(
                r"(?:when|if)\s+(?:summariz|process|read)ing\s+this\s+(?:document|page|file)[^.]{0,80}(?:instead|ignore|must)",
            )],
        )
        .with_subfamily("poisoned_document"),
    );

    rules.push(
        Rule::new(
            "rag-002",
            "Hidden agent instruction",
            RuleFamily::Rag,
            Severity::High,
            0.8,
            vec![Pattern::insensitive(
                r"(?:AI|assistant|agent)\s*[,:]?\s*(?:please\s+)?(?:disregard|ignore)\s+the\s+user",
            )],
        )
        .with_subfamily("agent_directive"),
    );

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bundled_rules_are_valid() {
        for rule in BUNDLED_RULES.iter() {
            rule.validate()
                .unwrap_or_else(|e| panic!("bundled rule {} invalid: {}", rule.id, e));
        }
    }

    #[test]
    fn test_bundled_rule_ids_unique() {
        let ids: HashSet<&str> = BUNDLED_RULES.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), BUNDLED_RULES.len());
    }

    #[test]
    fn test_bundled_rules_compile() {
        use crate::matcher::CompiledPattern;
        for rule in BUNDLED_RULES.iter() {
            for pattern in &rule.patterns {
                CompiledPattern::compile_for_rule(pattern, &rule.id)
                    .unwrap_or_else(|e| panic!("bundled pattern failed: {}", e));
            }
        }
    }

    #[test]
    fn test_id_prefixes_match_families() {
        for rule in BUNDLED_RULES.iter() {
            assert_eq!(
                RuleFamily::from_rule_id(&rule.id),
                rule.family,
                "rule {} prefix does not match family",
                rule.id
            );
        }
    }

    #[test]
    fn test_families_covered() {
        let families: HashSet<RuleFamily> = BUNDLED_RULES.iter().map(|r| r.family).collect();
        for family in [
            RuleFamily::Pi,
            RuleFamily::Jb,
            RuleFamily::Pii,
            RuleFamily::Cmd,
            RuleFamily::Enc,
            RuleFamily::Rag,
        ] {
            assert!(families.contains(&family), "no bundled rules for {}", family);
        }
    }
}
