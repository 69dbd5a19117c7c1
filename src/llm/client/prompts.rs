//! Default LLM prompts for document analysis.

/// System message sent with every request.
pub const SYSTEM_PROMPT: &str = "You extract structured personal information from identity documents. \
Reply with a single JSON object and nothing else.";

/// Prompt for extracting structured fields from document text.
pub const DEFAULT_TEXT_PROMPT: &str = r#"The following text was extracted from an identity or personal document (passport, ID card, driver's licence, CV, certificate or similar). Some of it may come from OCR and contain recognition errors; correct obvious OCR mistakes in names and dates where the intended value is clear.

Return a JSON object with these sections, omitting any field you cannot find:

{
  "personal_info": {
    "full_name": "", "given_names": "", "surname": "", "date_of_birth": "",
    "place_of_birth": "", "gender": "", "nationality": "", "address": "",
    "phone": "", "email": ""
  },
  "document_info": {
    "document_type": "", "document_number": "", "issue_date": "",
    "expiry_date": "", "issuing_authority": "", "issuing_country": ""
  },
  "additional_info": {}
}

Use ISO 8601 (YYYY-MM-DD) for dates when the full date is known. Put anything relevant that does not fit the named fields into "additional_info". Do not invent values.

Document text:
{content}"#;

/// Prompt for describing a face image and reading any visible identity details.
pub const DEFAULT_IMAGE_PROMPT: &str = r#"This image is a face photo cropped from an identity document. Describe what is visible and read any legible text around the face.

Return a JSON object with these sections, omitting any field you cannot determine:

{
  "personal_info": {
    "full_name": "", "date_of_birth": "", "document_number": ""
  },
  "visual_attributes": {
    "estimated_age_range": "", "gender_presentation": "", "hair_color": "",
    "eye_color": "", "glasses": "", "distinguishing_features": ""
  }
}

Only fill "personal_info" from text actually legible in the image. Do not guess identities."#;
