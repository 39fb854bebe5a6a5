use crate::{
    chat::{Attachment, AttachmentContent, ChatInput, ChatOptions, HistoryTurn, Role},
    errors::{AiError, AiResult},
    providers::{ProviderKind, gemini::model::*},
};

/// Gemini calls the assistant "model"
pub fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::System | Role::User => "user",
    }
}

/// Inline bytes become `inlineData`, references become `fileData`
pub fn part_for_attachment(attachment: &Attachment) -> GeminiPart {
    match attachment.content() {
        AttachmentContent::Bytes(_) => GeminiPart {
            inline_data: attachment.base64().map(|data| Blob {
                mime_type: attachment.media_type().to_string(),
                data,
            }),
            ..GeminiPart::default()
        },
        AttachmentContent::Reference(reference) => GeminiPart {
            file_data: Some(FileData {
                mime_type: attachment.media_type().to_string(),
                file_uri: reference.clone(),
            }),
            ..GeminiPart::default()
        },
    }
}

fn content_for_turn(turn: &HistoryTurn) -> GeminiContent {
    let mut parts = vec![GeminiPart::text(turn.content.clone())];
    if turn.role == Role::User {
        parts.extend(turn.file_refs.iter().map(|file| GeminiPart {
            file_data: Some(FileData {
                mime_type: file
                    .media_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                file_uri: file.id.clone(),
            }),
            ..GeminiPart::default()
        }));
    }
    GeminiContent {
        role: Some(gemini_role(turn.role).to_string()),
        parts,
    }
}

/// System instruction and conversation contents of a chat input
pub fn build_contents(input: &ChatInput, options: &ChatOptions) -> (Option<GeminiContent>, Vec<GeminiContent>) {
    let mut system_parts: Vec<GeminiPart> = options.system_prompt().map(GeminiPart::text).into_iter().collect();
    let mut contents = Vec::with_capacity(input.history().len() + 1);

    for turn in input.history() {
        if turn.role == Role::System {
            system_parts.push(GeminiPart::text(turn.content.clone()));
        } else {
            contents.push(content_for_turn(turn));
        }
    }

    let mut parts = vec![GeminiPart::text(input.message())];
    parts.extend(input.images().iter().map(part_for_attachment));
    parts.extend(input.files().iter().map(part_for_attachment));
    contents.push(GeminiContent {
        role: Some("user".to_string()),
        parts,
    });

    let system_instruction = (!system_parts.is_empty()).then(|| GeminiContent {
        role: None,
        parts: system_parts,
    });

    (system_instruction, contents)
}

/// Answer text of a response chunk, skipping reasoning summaries
pub fn answer_texts(response: &GeminiResponse) -> impl Iterator<Item = &str> {
    response
        .candidates
        .iter()
        .take(1)
        .filter_map(|candidate| candidate.content.as_ref())
        .flat_map(|content| content.parts.iter())
        .filter(|part| part.thought != Some(true))
        .filter_map(|part| part.text.as_deref())
}

/// Map finish and block reasons onto errors.
///
/// Returns `Ok(true)` when the response is finished normally.
pub fn check_finish(response: &GeminiResponse) -> AiResult<bool> {
    let provider = ProviderKind::Google.name();

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(AiError::vendor(provider, format!("prompt blocked: {}", reason)));
    }

    let Some(reason) = response
        .candidates
        .first()
        .and_then(|candidate| candidate.finish_reason.as_deref())
    else {
        return Ok(false);
    };

    match reason {
        "MAX_TOKENS" => Err(AiError::token_limit(provider, "finishReason 'MAX_TOKENS'")),
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" | "IMAGE_SAFETY" => {
            Err(AiError::vendor(provider, format!("response blocked: {}", reason)))
        }
        _ => Ok(true),
    }
}
