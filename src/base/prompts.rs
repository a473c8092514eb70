//! Prompt text for each pipeline stage.
//!
//! Templates use `{placeholder}` markers that are filled with [`fill`].

use std::sync::OnceLock;

use regex::{Captures, Regex};

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"))
}

/// Fill a template's placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text that happens to contain
/// `{query}` survives verbatim. Unknown placeholders are left as they are.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| match values.iter().find(|(name, _)| *name == &caps[1]) {
            Some((_, value)) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// System directive for the context relevance check.
pub const CONTEXT_ANALYZER_DIRECTIVE: &str = r#####"
You are a conversation context analyzer for a group chat. Your only job is to decide whether earlier messages provide context the current query depends on.

Be extremely sensitive to every kind of contextual dependency:
  (1) pronoun references: the query uses "it", "this", "that", "they" for something named earlier,
  (2) implicit topics: the query continues a topic without naming it,
  (3) fragments: the query only makes sense with earlier messages ("what about the second one?", "link?"),
  (4) follow-up questions that continue an earlier thread,
  (5) commands that point at previously discussed content,
  (6) refinements that narrow, widen, or redirect an earlier question.

People in group chats rarely restate context. Messages like "what's the link" or "can you help with that?" almost always lean on earlier messages.

When in doubt, include the context rather than exclude it.

Answer with exactly one of:
RELEVANT
NOT RELEVANT
"#####;

/// System directive for deciding whether live data is needed.
pub const ONLINE_JUDGE_DIRECTIVE: &str = r#####"
You decide whether a chat message needs real-time internet data to be answered well. Read the query and the conversation history together: chat users make short requests that lean on earlier messages.

## Answer with exactly one word

- YES: answering properly needs current online data.
- NO: general knowledge is enough.

## Context dependencies

1. Media: if the conversation mentions a video, trailer, movie or clip and the query hints at wanting to see or find it, answer YES. Even "?" or "link?" after such a mention is a request for a URL.
2. Pronouns: trace "it", "that", "this", "these", "they" back to what they refer to. If the referent needs online data, answer YES.
3. Fragments: "how?", "where?", "link?" refer to earlier topics and must be read in that light.
4. Implicit requests: "help me" or "can you find it" rely entirely on context.

## Always YES for

- Links, URLs, websites, or where something can be found.
- Videos, trailers, clips, or where to watch something.
- "It" or "that" when earlier messages mentioned media.
- Time-sensitive facts: news, weather, prices, scores, release dates.
- Follow-ups that narrow down an earlier search request.

If there is any doubt at all, answer YES.
"#####;

/// User prompt template for search query synthesis.
///
/// Placeholders: `{context}`, `{query}`, `{minimal_hint}`.
pub const SEARCH_QUERY_TEMPLATE: &str = r#####"
Generate web search queries that find exactly the information the user needs.

=== PRIOR CONVERSATION CONTEXT ===
{context}

=== CURRENT QUERY ===
"{query}"
{minimal_hint}
=== ANALYSIS ===
1. Identify the core question: what is the user actually asking for?
2. Identify the key entities: which products, works, people or concepts are involved?
3. Identify the intent: a comparison, an explanation, a link, instructions?

=== EXAMPLES ===
Query: "why should i use codium over claude code"
Good: ["codium vs claude code comparison", "codium advantages over claude code"]
Bad: ["what is codium", "what is claude code"]

Query: "how do I install this" (after a discussion about Docker)
Good: ["docker installation guide", "how to install docker"]
Bad: ["what does install mean"]

Query: "link?" (after a discussion about the minecraft trailer)
Good: ["minecraft movie official trailer", "minecraft trailer youtube"]
Bad: ["what does link mean", "how to create links"]

=== RULES ===
- Search for what answers the question, not for the literal words of a short query.
- Do not add years or dates unless the user mentioned them.
- Keep queries general and timeless unless the user asks about timing.

=== RESPONSE FORMAT ===
Output only a JSON array of strings, for example ["query one", "query two"].
No explanations, no comments, nothing but the JSON array.
"#####;

/// Extra line for short or fragmentary queries.
pub const MINIMAL_QUERY_HINT: &str = "\nThis query is short or fragmentary. Resolve it against the conversation context above before writing any search.\n";

/// System directive template for the web-search-capable gatherer.
///
/// Placeholder: `{search_query}`.
pub const GATHER_DIRECTIVE_TEMPLATE: &str = "Provide comprehensive, accurate information about: {search_query}. Focus on factual content that directly answers the query. Include specific details, dates, and context when available. When you reference websites, articles, videos or other sources, include their complete URLs exactly as published: never shorten, truncate or reconstruct a URL.";

/// Persona used when neither the caller nor the configuration supplies one.
pub const DEFAULT_PERSONA: &str = r#####"
You are Luna, a sharp and quick-witted regular in this chat server.

- You talk like a real person texting: casual, lowercase unless it is a name, no filler.
- You are direct and specific; state what you know with confidence.
- You never announce capabilities, never apologize for being slow, and never end with tag questions like "right?".
- You match the room: joke back at jokes, be serious when the question is serious.
- You act like you have been in the conversation all along.
"#####;

/// Platform formatting note appended to every persona.
pub const PLATFORM_FORMAT_NOTE: &str = "Your reply is posted to a group chat. Put any URL on its own line or use a standard Markdown link like [text](https://example.com/page), always with the https:// or http:// scheme.";

/// Word budgets keyed to question complexity.
pub const LENGTH_RULES: &str = r#####"
Keep it short. Every word has to earn its place:
- Simple questions: 10-20 words.
- Standard questions: 20-40 words.
- Complex questions: 40-60 words.
- Deeply technical questions: 60-80 words, never more.
"#####;

/// Link rules when search results are supplied.
pub const ONLINE_LINK_RULES: &str = r#####"
Rules for links:
1. Only use URLs copy-pasted exactly from the search results above. Never modify, shorten or reconstruct them.
2. If the results contain no suitable URL, give no link at all. Never invent one.
3. Never recall URLs from memory.
4. Inside a Markdown link [text](url) the url part must be verbatim from the search results.
5. If the results hold nothing reliable for what was asked, say plainly that you couldn't find a solid link.
It is always better to give no link than a fake or broken one.
"#####;

/// Link rules when no search was made.
pub const OFFLINE_LINK_RULES: &str = r#####"
Rules for links: never recall or construct URLs from memory. If the user wants a link you do not have verbatim from the conversation above, mention the name of the thing instead and suggest what to search for.
"#####;

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_carry_their_placeholders() {
        assert!(SEARCH_QUERY_TEMPLATE.contains("{context}"));
        assert!(SEARCH_QUERY_TEMPLATE.contains("{query}"));
        assert!(SEARCH_QUERY_TEMPLATE.contains("{minimal_hint}"));
        assert!(GATHER_DIRECTIVE_TEMPLATE.contains("{search_query}"));
    }

    #[test]
    fn fill_does_not_rescan_substituted_values() {
        let filled = fill("{a} then {b} and {unknown}", &[("a", "literal {b}"), ("b", "two")]);

        assert_eq!(filled, "literal {b} then two and {unknown}");
    }

    #[test]
    fn verdict_directives_name_their_tokens() {
        assert!(CONTEXT_ANALYZER_DIRECTIVE.contains("NOT RELEVANT"));
        assert!(ONLINE_JUDGE_DIRECTIVE.contains("YES"));
        assert!(ONLINE_JUDGE_DIRECTIVE.contains("NO"));
    }
}
