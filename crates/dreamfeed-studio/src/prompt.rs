//! Effective-prompt resolution for generation actions.
//!
//! The prompt a schedule carries is not necessarily the prompt sent to the
//! provider: a custom pool can replace it, a character context can prefix it,
//! and a mutation template can rewrite it. Resolution order: pool pick,
//! context prefix, template substitution.

use rand::Rng;

use dreamfeed_core::ActionData;

use crate::error::{Result, StudioError};

/// Placeholder replaced with the resolved prompt in a mutation template.
const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Resolve the prompt to send to the generation provider.
///
/// The RNG drives the uniform pick from the custom pool and from the template
/// set; callers pass `rand::thread_rng()`, tests pass a seeded RNG.
pub fn resolve<R: Rng>(
    action: &ActionData,
    mutation_templates: &[String],
    rng: &mut R,
) -> Result<String> {
    let base = if action.use_custom_prompt && !action.custom_prompts.is_empty() {
        action.custom_prompts[rng.gen_range(0..action.custom_prompts.len())].clone()
    } else {
        action
            .prompt
            .clone()
            .ok_or_else(|| {
                StudioError::BadActionData(
                    "generation action needs a prompt or a custom prompt pool".to_string(),
                )
            })?
    };
    if base.trim().is_empty() {
        return Err(StudioError::BadActionData(
            "prompt must not be empty".to_string(),
        ));
    }

    let prompt = match action.character_context.as_deref() {
        Some(context) if !context.trim().is_empty() => format!("{context}. {base}"),
        _ => base,
    };

    // An empty template set disables mutation even when the action asks for it.
    if action.mutate_prompt && !mutation_templates.is_empty() {
        let template = &mutation_templates[rng.gen_range(0..mutation_templates.len())];
        return Ok(template.replace(PROMPT_PLACEHOLDER, &prompt));
    }
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn action(prompt: &str) -> ActionData {
        ActionData {
            prompt: Some(prompt.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn plain_prompt_passes_through() {
        let resolved = resolve(&action("sunset over the bay"), &[], &mut rng()).unwrap();
        assert_eq!(resolved, "sunset over the bay");
    }

    #[test]
    fn character_context_prefixes() {
        let mut a = action("walking in the rain");
        a.character_context = Some("Mira, a red-haired android".to_string());
        let resolved = resolve(&a, &[], &mut rng()).unwrap();
        assert_eq!(resolved, "Mira, a red-haired android. walking in the rain");
    }

    #[test]
    fn custom_pool_replaces_base_prompt() {
        let mut a = action("ignored");
        a.use_custom_prompt = true;
        a.custom_prompts = vec!["pool one".to_string(), "pool two".to_string()];
        let resolved = resolve(&a, &[], &mut rng()).unwrap();
        assert!(a.custom_prompts.contains(&resolved));
    }

    #[test]
    fn empty_pool_falls_back_to_prompt() {
        let mut a = action("fallback");
        a.use_custom_prompt = true;
        let resolved = resolve(&a, &[], &mut rng()).unwrap();
        assert_eq!(resolved, "fallback");
    }

    #[test]
    fn mutation_substitutes_placeholder() {
        let mut a = action("a quiet street");
        a.mutate_prompt = true;
        let templates = vec!["{prompt}, golden hour, 35mm".to_string()];
        let resolved = resolve(&a, &templates, &mut rng()).unwrap();
        assert_eq!(resolved, "a quiet street, golden hour, 35mm");
    }

    #[test]
    fn mutation_without_templates_is_a_noop() {
        let mut a = action("a quiet street");
        a.mutate_prompt = true;
        let resolved = resolve(&a, &[], &mut rng()).unwrap();
        assert_eq!(resolved, "a quiet street");
    }

    #[test]
    fn missing_prompt_is_rejected() {
        let a = ActionData::default();
        assert!(matches!(
            resolve(&a, &[], &mut rng()),
            Err(StudioError::BadActionData(_))
        ));
    }

    #[test]
    fn blank_prompt_is_rejected() {
        assert!(matches!(
            resolve(&action("   "), &[], &mut rng()),
            Err(StudioError::BadActionData(_))
        ));
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let mut a = action("ignored");
        a.use_custom_prompt = true;
        a.custom_prompts = (0..10).map(|i| format!("prompt {i}")).collect();
        let first = resolve(&a, &[], &mut StdRng::seed_from_u64(42)).unwrap();
        let second = resolve(&a, &[], &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(first, second);
    }
}
