//! Instructions sent to the vision model with every invoice image.
//!
//! Both prompts are a steering contract, not a schema the model is bound to:
//! local vision models routinely drop commas, emit `""` for unknowns, or
//! answer in prose. [`crate::pipeline::normalize`] is what actually enforces
//! the shape. Keeping the prompts here lets tests assert on them without a
//! running model.

/// System message: the assistant's role and the output-format rules.
pub const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in extracting structured data from invoice images. Always return data in valid JSON format with proper commas between fields. Use null for missing values instead of empty strings.";

/// User message sent alongside the rendered first page.
///
/// Enumerates the fifteen target fields with their types and meaning.
pub const EXTRACTION_PROMPT: &str = r#"Analyze this invoice image and extract the following information in a valid JSON format with proper commas between fields:
    {
        "invoice_id": "string - invoice number or identifier",
        "invoice_date": "string - date of invoice (YYYY-MM-DD)",
        "total_amount": number - total amount including tax,
        "net_amount": number - amount before tax,
        "tax_percentage": number - VAT percentage,
        "total_tax_amount": number - total tax amount,
        "supplier_name": "string - company issuing invoice",
        "supplier_address": "string - address of supplier",
        "supplier_tax_id": "string - tax ID/VAT number",
        "supplier_registration": "string - company registration number",
        "receiver_name": "string - receiving company/person",
        "receiver_address": "string - address of receiver",
        "receiver_tax_id": "string - tax ID of receiver",
        "receiver_registration": "string - registration number of receiver",
        "line_items": [
            {
                "amount": number - item amount,
                "description": "string - item description"
            }
        ]
    }

    IMPORTANT: Format the response as a proper JSON object with commas after each key-value pair. Use null for missing values instead of empty strings. Return ONLY the JSON object, no other text."#;
