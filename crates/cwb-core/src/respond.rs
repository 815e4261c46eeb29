//! Response generation: two interchangeable strategies behind one trait.
//!
//! `TemplateResponder` is fully deterministic (fixed sentences with numbers
//! substituted in) and doubles as the test oracle. `LlmResponder` hands the
//! aggregate to a language model for phrasing and falls back to the template
//! output whenever the model is unreachable or answers garbage. An upstream
//! failure must never reach the user as an error.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    domain::{AggregateLookup, ItemSummary},
    intent::Intent,
    ports::LlmPort,
};

const GREETING: &str = "Hello! I'm your coffee shop sales assistant. I can help you with sales \
     data and analytics. Try asking about your best-selling items!";

const HELP: &str = "I can help you with your coffee shop sales data! Here are some things you can ask:\n\n\
     - \"What's my best-selling drink this week?\"\n\
     - \"How many cappuccinos did I sell?\"\n\
     - \"What are my top 5 items?\"\n\
     - \"Show me coffee sales\"\n\
     - \"What's my revenue today?\"\n\n\
     Just ask me any question about your sales and I'll help you find the answer!";

const GENERAL_NUDGE: &str = "I'm best at questions about your sales. Try asking about your \
     best-selling items or your revenue this week.";

const APOLOGY: &str = "Sorry, I can't reach your sales data right now. Please try again in a \
     few minutes.";

const STALE_NOTE: &str = "(Heads up: the POS was unreachable, so these numbers are from the \
     last saved snapshot.)";

/// Minimum plausible LLM reply; anything shorter falls back to the template.
const MIN_LLM_REPLY_LEN: usize = 10;

/// A response strategy. `data` is `None` when the sales processor signalled
/// `DataUnavailable`; implementations must still produce a non-empty reply.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, intent: &Intent, data: Option<&AggregateLookup>) -> String;
}

/// Deterministic fixed-template formatter.
#[derive(Clone, Copy, Debug, Default)]
pub struct TemplateResponder;

impl TemplateResponder {
    fn best_sellers(&self, lookup: &AggregateLookup, category: Option<&str>) -> String {
        let items: Vec<ItemSummary> = match category {
            Some(cat) => lookup.aggregate.filtered(cat),
            None => lookup.aggregate.items.clone(),
        };

        if items.is_empty() {
            return match category {
                Some(cat) => format!("I don't see any {} sales in the current period.", cat.to_lowercase()),
                None => "I don't have any sales data for the current period yet.".to_string(),
            };
        }

        let top = &items[0];
        let mut out = format!(
            "Your best-selling item is {} with {} sold (${:.2} revenue)",
            top.name, top.quantity_sold, top.revenue
        );
        if let Some(second) = items.get(1) {
            out.push_str(&format!(
                ", followed by {} with {} sold",
                second.name, second.quantity_sold
            ));
        }
        out.push('.');
        self.with_stale_note(out, lookup.stale)
    }

    fn revenue(&self, lookup: &AggregateLookup) -> String {
        let agg = &lookup.aggregate;
        let out = format!(
            "Over the last period you sold {} items across {} orders for ${:.2} in total revenue.",
            agg.total_items_sold, agg.orders_considered, agg.total_revenue
        );
        self.with_stale_note(out, lookup.stale)
    }

    fn category_breakdown(&self, lookup: &AggregateLookup) -> String {
        if lookup.aggregate.items.is_empty() {
            return "I don't have any sales data for the current period yet.".to_string();
        }

        let mut by_category: BTreeMap<&str, (u32, f64)> = BTreeMap::new();
        for item in &lookup.aggregate.items {
            let entry = by_category.entry(item.category.as_str()).or_insert((0, 0.0));
            entry.0 += item.quantity_sold;
            entry.1 += item.revenue;
        }

        let mut out = String::from("Sales by category:");
        for (category, (qty, revenue)) in by_category {
            out.push_str(&format!("\n- {category}: {qty} sold, ${revenue:.2}"));
        }
        self.with_stale_note(out, lookup.stale)
    }

    fn with_stale_note(&self, mut text: String, stale: bool) -> String {
        if stale {
            text.push_str("\n\n");
            text.push_str(STALE_NOTE);
        }
        text
    }
}

#[async_trait]
impl Responder for TemplateResponder {
    async fn respond(&self, intent: &Intent, data: Option<&AggregateLookup>) -> String {
        match intent {
            Intent::Greeting => GREETING.to_string(),
            Intent::Help => HELP.to_string(),
            Intent::General => GENERAL_NUDGE.to_string(),
            Intent::BestSellers { category } => match data {
                Some(lookup) => self.best_sellers(lookup, category.as_deref()),
                None => APOLOGY.to_string(),
            },
            Intent::Revenue => match data {
                Some(lookup) => self.revenue(lookup),
                None => APOLOGY.to_string(),
            },
            Intent::CategoryBreakdown => match data {
                Some(lookup) => self.category_breakdown(lookup),
                None => APOLOGY.to_string(),
            },
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant for a coffee shop owner. You provide \
     clear, concise, and friendly responses about sales data and business analytics. Always be \
     professional but approachable.";

/// LLM-phrased responses with a deterministic safety net.
pub struct LlmResponder {
    llm: Arc<dyn LlmPort>,
    fallback: TemplateResponder,
}

impl LlmResponder {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self {
            llm,
            fallback: TemplateResponder,
        }
    }

    fn build_prompt(&self, intent: &Intent, lookup: &AggregateLookup) -> String {
        let mut parts = vec![String::from("Current sales data:")];

        for (i, item) in lookup.aggregate.top(5).iter().enumerate() {
            parts.push(format!(
                "{}. {}: {} sold, ${:.2} revenue ({})",
                i + 1,
                item.name,
                item.quantity_sold,
                item.revenue,
                item.category
            ));
        }
        parts.push(format!(
            "Totals: {} items sold, ${:.2} revenue across {} orders.",
            lookup.aggregate.total_items_sold,
            lookup.aggregate.total_revenue,
            lookup.aggregate.orders_considered
        ));
        if lookup.stale {
            parts.push(
                "Note: this snapshot is stale; mention that the numbers may be slightly out of date."
                    .to_string(),
            );
        }

        let question = match intent {
            Intent::BestSellers { category: Some(cat) } => {
                format!("What are the best-selling {} items?", cat.to_lowercase())
            }
            Intent::BestSellers { category: None } => "What are the best-selling items?".to_string(),
            Intent::Revenue => "How is revenue doing?".to_string(),
            Intent::CategoryBreakdown => "Break the sales down by category.".to_string(),
            _ => "Summarize the sales data.".to_string(),
        };
        parts.push(format!("Question: {question}"));
        parts.push(
            "Answer in two or three friendly sentences, quoting the specific numbers above."
                .to_string(),
        );

        parts.join("\n")
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn respond(&self, intent: &Intent, data: Option<&AggregateLookup>) -> String {
        // Canned intents and the no-data apology stay deterministic; the
        // model only ever phrases real numbers.
        let Some(lookup) = data else {
            return self.fallback.respond(intent, None).await;
        };
        if matches!(intent, Intent::Greeting | Intent::Help | Intent::General) {
            return self.fallback.respond(intent, Some(lookup)).await;
        }

        let prompt = self.build_prompt(intent, lookup);
        match self.llm.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(reply) if reply.trim().len() >= MIN_LLM_REPLY_LEN => reply.trim().to_string(),
            Ok(_) => {
                tracing::warn!("LLM reply too short, using template fallback");
                self.fallback.respond(intent, Some(lookup)).await
            }
            Err(err) => {
                tracing::warn!(error = %err, "LLM call failed, using template fallback");
                self.fallback.respond(intent, Some(lookup)).await
            }
        }
    }
}
