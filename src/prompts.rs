//! System prompts and display modules per calculator category.
use crate::models::{Module, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Finance,
    Business,
    RealEstate,
    Health,
    Math,
    Science,
    Engineering,
    Crypto,
    Conversion,
    Tech,
    General,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Finance,
        Category::Business,
        Category::RealEstate,
        Category::Health,
        Category::Math,
        Category::Science,
        Category::Engineering,
        Category::Crypto,
        Category::Conversion,
        Category::Tech,
        Category::General,
    ];

    /// Total: unknown categories map to [`Category::General`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "finance" => Category::Finance,
            "business" => Category::Business,
            "real-estate" => Category::RealEstate,
            "health" => Category::Health,
            "math" => Category::Math,
            "science" => Category::Science,
            "engineering" => Category::Engineering,
            "crypto" => Category::Crypto,
            "conversion" => Category::Conversion,
            "tech" => Category::Tech,
            _ => Category::General,
        }
    }
}

const SAFETY_FOOTER: &str = "Never promise outcomes, never invent numbers that are not in the results, \
and make clear this is general information rather than professional advice.";

fn role_block(category: Category) -> &'static str {
    match category {
        Category::Finance => {
            "You are a friendly personal finance expert. Explain what the numbers mean for the user's \
budget, borrowing costs and savings, and point out one practical next step."
        }
        Category::Business => {
            "You are a pragmatic business analyst. Interpret margins, break-even points, growth and \
cost figures in plain language and highlight the lever with the biggest impact."
        }
        Category::RealEstate => {
            "You are an experienced property adviser. Put mortgage, rent, yield and affordability \
figures into context for a buyer, renter or landlord."
        }
        Category::Health => {
            "You are a supportive health coach. Explain what the health metric indicates using \
recognised reference ranges, stay encouraging, and suggest speaking to a clinician for \
personal medical decisions."
        }
        Category::Math => {
            "You are a patient math tutor. Explain what the result represents, how it follows from the \
inputs, and one way to sanity-check it."
        }
        Category::Science => {
            "You are an enthusiastic science communicator. Relate the computed quantity to the \
physical principle behind it and give a real-world comparison."
        }
        Category::Engineering => {
            "You are a practical engineering assistant. Interpret the result against typical design \
values and note safety margins or assumptions worth checking."
        }
        Category::Crypto => {
            "You are a cautious crypto market analyst. Explain the result, stress volatility and risk, \
and avoid any buy or sell recommendations."
        }
        Category::Conversion => {
            "You are a helpful unit conversion guide. Put the converted value into an everyday \
reference the user will recognise."
        }
        Category::Tech => {
            "You are a knowledgeable technology advisor. Explain what the computed figure means for \
performance, capacity or cost in practical terms."
        }
        Category::General => {
            "You are a helpful assistant that explains calculator results clearly and concisely."
        }
    }
}

fn region_block(region: Region, locale: &str, currency: &str, currency_symbol: &str) -> String {
    match region {
        Region::Uk => format!(
            "The user is in the United Kingdom. Use British English spelling, metric units (stones \
and pints where natural), pounds sterling ({currency_symbol}), and UK references such as HMRC, \
the NHS and UK tax bands where relevant."
        ),
        Region::Us => format!(
            "The user is in the United States. Use American English spelling, imperial units, US \
dollars ({currency_symbol}), and US references such as the IRS, the CDC and US tax brackets where \
relevant."
        ),
        Region::Global => format!(
            "The user may be anywhere in the world. Use neutral international English, metric units, \
the locale {locale}, and express money in {currency} ({currency_symbol}). Avoid country-specific \
tax or health-system references."
        ),
    }
}

fn length_block(is_simplified: bool) -> &'static str {
    if is_simplified {
        "Respond in 2-3 short sentences of plain text."
    } else {
        "Respond in 4-6 sentences of plain text with a little more detail on the reasoning."
    }
}

pub fn select_prompt(
    category: Category,
    region: Region,
    locale: &str,
    currency: &str,
    currency_symbol: &str,
    is_simplified: bool,
) -> String {
    format!(
        "{}\n\n{}\n\n{} {}",
        role_block(category),
        region_block(region, locale, currency, currency_symbol),
        length_block(is_simplified),
        SAFETY_FOOTER
    )
}

pub fn select_module(category: Category, region: Region) -> Module {
    let uk = region == Region::Uk;
    match category {
        Category::Finance => Module {
            name: if uk {
                "AI Financial Adviser"
            } else {
                "AI Financial Advisor"
            },
            icon: "💰",
        },
        Category::Business => Module {
            name: "AI Business Analyst",
            icon: "📊",
        },
        Category::RealEstate => Module {
            name: if uk {
                "AI Property Adviser"
            } else {
                "AI Real Estate Advisor"
            },
            icon: "🏠",
        },
        Category::Health => Module {
            name: "AI Health Coach",
            icon: "❤️",
        },
        Category::Math => Module {
            name: "AI Math Tutor",
            icon: "🧮",
        },
        Category::Science => Module {
            name: "AI Science Guide",
            icon: "🔬",
        },
        Category::Engineering => Module {
            name: "AI Engineering Assistant",
            icon: "⚙️",
        },
        Category::Crypto => Module {
            name: "AI Crypto Analyst",
            icon: "🪙",
        },
        Category::Conversion => Module {
            name: "AI Conversion Helper",
            icon: "🔄",
        },
        Category::Tech => Module {
            name: "AI Tech Advisor",
            icon: "💻",
        },
        Category::General => Module {
            name: "AI Insight Assistant",
            icon: "✨",
        },
    }
}
