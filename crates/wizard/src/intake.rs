//! The eight steps of the watch authentication intake form.

use shared::domain::TriState;

use crate::schema::{Condition, FieldSpec, Rule, StepDefinition};

pub const TOTAL_STEPS: usize = 8;

pub const USER_TYPES: &[&str] = &["personal", "company"];
pub const PURCHASE_SOURCES: &[&str] = &["authorized_dealer", "private_sale", "auction", "grey_market", "other"];
pub const CONDITIONS: &[&str] = &["unworn", "excellent", "very_good", "good", "fair", "poor"];
pub const SERVICE_LEVELS: &[&str] = &["standard", "express"];
pub const RETURN_METHODS: &[&str] = &["insured_courier", "pickup"];

const MAX_PHOTO_BYTES: u64 = 10 * 1024 * 1024;
const MAX_DOCUMENT_BYTES: u64 = 15 * 1024 * 1024;

pub fn intake_steps() -> Vec<StepDefinition> {
    vec![
        owner_step(),
        watch_identity_step(),
        provenance_step(),
        condition_step(),
        service_history_step(),
        photos_step(),
        documents_step(),
        review_step(),
    ]
}

fn owner_step() -> StepDefinition {
    let is_company = || Condition::equals("user_type", "company");
    StepDefinition::new(
        0,
        "owner",
        "Owner details",
        vec![
            FieldSpec::choice("user_type", USER_TYPES).required(),
            FieldSpec::text("first_name").required().rule(Rule::MaxLength(80)),
            FieldSpec::text("last_name").required().rule(Rule::MaxLength(80)),
            FieldSpec::text("email").required().rule(Rule::Email),
            FieldSpec::text("phone").required().rule(Rule::Phone),
            FieldSpec::text("company_name")
                .required_when(is_company())
                .rule(Rule::MinLength(2))
                .rule(Rule::MaxLength(120)),
            FieldSpec::text("vat_number")
                .required_when(is_company())
                .rule(Rule::pattern(r"^[A-Z]{2}[0-9A-Z]{2,12}$", "must be a VAT number like DE123456789")),
        ],
    )
}

fn watch_identity_step() -> StepDefinition {
    StepDefinition::new(
        1,
        "watch",
        "Watch identity",
        vec![
            FieldSpec::text("brand").required().rule(Rule::MaxLength(60)),
            FieldSpec::text("model").required().rule(Rule::MaxLength(80)),
            FieldSpec::text("reference_number")
                .required()
                .rule(Rule::pattern(r"^[A-Za-z0-9./\- ]{3,30}$", "must be 3-30 letters, digits, '.', '/' or '-'")),
            FieldSpec::text("serial_number")
                .required()
                .rule(Rule::pattern(r"^[A-Za-z0-9\-]{4,20}$", "must be 4-20 letters, digits or '-'")),
            FieldSpec::text("production_year").rule(Rule::Year { min: 1850 }),
            FieldSpec::text("case_material").rule(Rule::MaxLength(60)),
            FieldSpec::text("movement_caliber").rule(Rule::MaxLength(60)),
        ],
    )
}

fn provenance_step() -> StepDefinition {
    StepDefinition::new(
        2,
        "provenance",
        "Purchase and provenance",
        vec![
            FieldSpec::choice("purchase_source", PURCHASE_SOURCES).required(),
            FieldSpec::text("purchase_date").rule(Rule::PastDate),
            FieldSpec::tri("has_box").required(),
            FieldSpec::tri("has_papers").required(),
            FieldSpec::text("papers_date")
                .required_when(Condition::is("has_papers", TriState::Yes))
                .rule(Rule::PastDate),
            FieldSpec::text("previous_owners").rule(Rule::pattern(r"^[0-9]{1,2}$", "must be a number")),
        ],
    )
}

fn condition_step() -> StepDefinition {
    StepDefinition::new(
        3,
        "condition",
        "Condition",
        vec![
            FieldSpec::choice("case_condition", CONDITIONS).required(),
            FieldSpec::choice("dial_condition", CONDITIONS).required(),
            FieldSpec::choice("bracelet_condition", CONDITIONS),
            FieldSpec::tri("is_running").required(),
            FieldSpec::tri("has_been_polished").required(),
            FieldSpec::text("condition_notes").rule(Rule::MaxLength(2000)),
        ],
    )
}

fn service_history_step() -> StepDefinition {
    let serviced = || Condition::is("has_been_serviced", TriState::Yes);
    StepDefinition::new(
        4,
        "service",
        "Service history",
        vec![
            FieldSpec::tri("has_been_serviced").required(),
            FieldSpec::text("service_center")
                .required_when(serviced())
                .rule(Rule::MaxLength(120)),
            FieldSpec::text("last_service_date")
                .required_when(serviced())
                .rule(Rule::PastDate),
            FieldSpec::file("service_receipt")
                .rule(Rule::MaxFileSize(MAX_DOCUMENT_BYTES)),
            FieldSpec::tri("has_replaced_parts").required(),
            FieldSpec::text("replaced_parts")
                .required_when(Condition::is("has_replaced_parts", TriState::Yes))
                .rule(Rule::MaxLength(1000)),
        ],
    )
}

fn photos_step() -> StepDefinition {
    let image = |spec: FieldSpec| {
        spec.rule(Rule::MimePrefix("image/"))
            .rule(Rule::MaxFileSize(MAX_PHOTO_BYTES))
    };
    StepDefinition::new(
        5,
        "photos",
        "Photos",
        vec![
            image(FieldSpec::file("photo_dial").required()),
            image(FieldSpec::file("photo_caseback").required()),
            image(FieldSpec::file("photo_clasp").required()),
            image(FieldSpec::file("photo_movement")),
            image(FieldSpec::file_list("additional_photos")).rule(Rule::MaxItems(10)),
        ],
    )
}

fn documents_step() -> StepDefinition {
    StepDefinition::new(
        6,
        "documents",
        "Documents",
        vec![
            FieldSpec::file("warranty_card")
                .required_when(Condition::is("has_papers", TriState::Yes))
                .rule(Rule::MaxFileSize(MAX_DOCUMENT_BYTES)),
            FieldSpec::file("purchase_invoice").rule(Rule::MaxFileSize(MAX_DOCUMENT_BYTES)),
            FieldSpec::file_list("other_documents")
                .rule(Rule::MaxItems(5))
                .rule(Rule::MaxFileSize(MAX_DOCUMENT_BYTES)),
        ],
    )
}

fn review_step() -> StepDefinition {
    StepDefinition::new(
        7,
        "review",
        "Service and declaration",
        vec![
            FieldSpec::choice("service_level", SERVICE_LEVELS).required(),
            FieldSpec::choice("return_method", RETURN_METHODS).required(),
            FieldSpec::nested(
                "shipping_address",
                vec![
                    FieldSpec::text("street").required().rule(Rule::MaxLength(120)),
                    FieldSpec::text("city").required().rule(Rule::MaxLength(80)),
                    FieldSpec::text("postal_code")
                        .required()
                        .rule(Rule::pattern(r"^[A-Za-z0-9 \-]{3,10}$", "must be a valid postal code")),
                    FieldSpec::text("country")
                        .required()
                        .rule(Rule::pattern(r"^[A-Z]{2}$", "must be a two-letter country code")),
                ],
            )
            .required_when(Condition::equals("return_method", "insured_courier")),
            FieldSpec::flag("declaration_accepted")
                .required()
                .rule(Rule::MustBeTrue),
        ],
    )
}
