//! Extracting structured answers from free-form model output.
//!
//! Models wrap JSON in prose or Markdown fences and nest results under
//! `data`. These helpers dig the useful part out or give up with `None`.

use serde_json::{Map, Value};

/// Keys that commonly carry a text answer.
const TEXT_KEYS: [&str; 5] = ["output", "text", "result", "message", "content"];

/// Remove a surrounding Markdown code fence (with optional language tag).
pub fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(after_open) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Opening fence line: ``` plus an optional [A-Za-z0-9_-]* tag, then newline.
    let tag_len = after_open
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(after_open.len());
    let body = match after_open[tag_len..].strip_prefix('\n') {
        Some(body) => body,
        None => return trimmed,
    };

    body.strip_suffix("\n```").unwrap_or(body).trim()
}

/// First balanced `{…}` in the text, fences removed.
///
/// Braces are counted without regard to string literals, so a brace inside a
/// quoted value can end the match early; the caller then fails to parse it.
pub fn extract_first_json_object(s: &str) -> Option<&str> {
    let text = strip_code_fences(s);
    let start = text.find('{')?;

    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn as_object(v: &Value) -> Option<&Map<String, Value>> {
    v.as_object()
}

/// Recover a JSON answer object carrying a `response` field.
///
/// Checks the result itself, then `result.data`, then any text field on
/// either, then the result as a bare string.
pub fn parse_json_answer(result: &Value) -> Option<Value> {
    let rec = as_object(result);
    let data = rec.and_then(|r| r.get("data")).and_then(as_object);

    if rec.is_some_and(|r| r.contains_key("response")) {
        return Some(result.clone());
    }
    if let Some(data) = data.filter(|d| d.contains_key("response")) {
        return Some(Value::Object(data.clone()));
    }

    let mut candidates: Vec<&str> = Vec::new();
    for source in [rec, data].into_iter().flatten() {
        candidates.extend(TEXT_KEYS.iter().filter_map(|k| source.get(*k)?.as_str()));
    }
    if let Some(s) = result.as_str() {
        candidates.push(s);
    }

    candidates.into_iter().find_map(|candidate| {
        let raw = strip_code_fences(candidate);
        serde_json::from_str(raw).ok().or_else(|| {
            extract_first_json_object(raw).and_then(|obj| serde_json::from_str(obj).ok())
        })
    })
}

/// First text field of the result, for debug snippets.
pub fn text_candidate(result: &Value) -> Option<&str> {
    let rec = as_object(result)?;
    rec.get("data")
        .and_then(as_object)
        .and_then(|d| d.get("text"))
        .and_then(Value::as_str)
        .or_else(|| rec.get("text").and_then(Value::as_str))
}

/// URL of the first generated image (`images[0].url` or `image.url`, at
/// the top level or under `data`).
pub fn extract_first_image_url(result: &Value) -> Option<String> {
    let rec = as_object(result);
    let data = rec.and_then(|r| r.get("data")).and_then(as_object);
    let field = |name: &str| data.and_then(|d| d.get(name)).or_else(|| rec.and_then(|r| r.get(name)));

    if let Some(images) = field("images").and_then(Value::as_array) {
        if let Some(url) = images.first().and_then(|i| i.get("url")).and_then(Value::as_str) {
            return Some(url.to_string());
        }
    }

    field("image")
        .and_then(|i| i.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// File extension for an image content type; JPEG when unknown.
pub fn ext_from_content_type(content_type: Option<&str>) -> &'static str {
    let t = content_type.unwrap_or_default().to_ascii_lowercase();
    if t.contains("jpeg") || t.contains("jpg") {
        "jpg"
    } else if t.contains("png") {
        "png"
    } else if t.contains("webp") {
        "webp"
    } else {
        "jpg"
    }
}

/// Extension from a client filename when it is short and alphanumeric,
/// otherwise from the content type.
pub fn image_extension(filename: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    from_name.unwrap_or_else(|| ext_from_content_type(content_type).to_string())
}

/// Human description derived from a model photo's filename:
/// `avatars/tall_woman-red.jpg` → `tall woman red`.
pub fn avatar_description(path: &str) -> String {
    let last = path.rsplit('/').next().unwrap_or(path);
    let base = match last.rfind('.') {
        Some(idx) if idx > 0 => &last[..idx],
        _ => last,
    };

    let mut out = String::with_capacity(base.len());
    let mut in_sep = false;
    for c in base.chars() {
        if c == '-' || c == '_' {
            if !in_sep {
                out.push(' ');
            }
            in_sep = true;
        } else {
            out.push(c);
            in_sep = false;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("  plain  "), "plain");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        // No newline after the opening fence: leave as is.
        assert_eq!(strip_code_fences("```{}```"), "```{}```");
    }

    #[test]
    fn test_extract_first_json_object() {
        assert_eq!(
            extract_first_json_object("Sure! {\"response\": true, \"x\": {\"y\": 1}} done {}"),
            Some("{\"response\": true, \"x\": {\"y\": 1}}")
        );
        assert_eq!(extract_first_json_object("no braces"), None);
        assert_eq!(extract_first_json_object("{ unbalanced"), None);
    }

    #[test]
    fn test_parse_json_answer_direct_and_nested() {
        let direct = json!({"response": true, "type": "Hat"});
        assert_eq!(parse_json_answer(&direct), Some(direct.clone()));

        let nested = json!({"data": {"response": false, "type": "none"}, "requestId": "r"});
        assert_eq!(
            parse_json_answer(&nested),
            Some(json!({"response": false, "type": "none"}))
        );
    }

    #[test]
    fn test_parse_json_answer_from_text() {
        let fenced = json!({"data": {"output": "```json\n{\"response\": true, \"type\": \"shirt\"}\n```"}});
        assert_eq!(
            parse_json_answer(&fenced),
            Some(json!({"response": true, "type": "shirt"}))
        );

        let prose = json!({"text": "I think {\"response\": true, \"type\": \"bag\"} fits."});
        assert_eq!(
            parse_json_answer(&prose),
            Some(json!({"response": true, "type": "bag"}))
        );

        let bare = json!("{\"response\": false, \"type\": \"none\"}");
        assert_eq!(
            parse_json_answer(&bare),
            Some(json!({"response": false, "type": "none"}))
        );
    }

    #[test]
    fn test_parse_json_answer_gives_up() {
        assert_eq!(parse_json_answer(&json!({"text": "no idea"})), None);
        assert_eq!(parse_json_answer(&json!(null)), None);
        assert_eq!(parse_json_answer(&json!(42)), None);
    }

    #[test]
    fn test_text_candidate() {
        assert_eq!(text_candidate(&json!({"data": {"text": "a"}, "text": "b"})), Some("a"));
        assert_eq!(text_candidate(&json!({"text": "b"})), Some("b"));
        assert_eq!(text_candidate(&json!({"output": "c"})), None);
    }

    #[test]
    fn test_extract_first_image_url() {
        assert_eq!(
            extract_first_image_url(&json!({"data": {"images": [{"url": "https://a/1.jpg"}]}})),
            Some("https://a/1.jpg".into())
        );
        assert_eq!(
            extract_first_image_url(&json!({"images": [{"url": "https://a/2.jpg"}]})),
            Some("https://a/2.jpg".into())
        );
        assert_eq!(
            extract_first_image_url(&json!({"image": {"url": "https://a/3.jpg"}})),
            Some("https://a/3.jpg".into())
        );
        assert_eq!(extract_first_image_url(&json!({"images": []})), None);
        assert_eq!(extract_first_image_url(&json!({"images": [{"uri": "x"}]})), None);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(ext_from_content_type(Some("image/PNG")), "png");
        assert_eq!(ext_from_content_type(Some("image/webp")), "webp");
        assert_eq!(ext_from_content_type(None), "jpg");
        assert_eq!(image_extension(Some("shirt.PNG"), Some("image/jpeg")), "png");
        assert_eq!(image_extension(Some("shirt.tar.gz!"), Some("image/webp")), "webp");
        assert_eq!(image_extension(Some("noext"), Some("image/png")), "png");
        assert_eq!(image_extension(None, None), "jpg");
    }

    #[test]
    fn test_avatar_description() {
        assert_eq!(avatar_description("avatars/tall_woman--red.jpg"), "tall woman red");
        assert_eq!(avatar_description("u1/outputs/wear/1700.jpg"), "1700");
        assert_eq!(avatar_description(".hidden"), ".hidden");
        assert_eq!(avatar_description("plain"), "plain");
    }
}
