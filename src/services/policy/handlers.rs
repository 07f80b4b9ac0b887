use crate::models::{conversation::recent, Appointment, BookingContext, SlotOption};
use crate::services::ai::Message;
use crate::services::appointments::{list_in_range, list_sorted, lookup_range};
use crate::services::booking::{self, BookingOutcome, BookingTurn, LastContext};
use crate::services::nlu::normalize::normalize;

use super::Turn;

pub const APOLOGY: &str = "⚠️ Đã có lỗi xảy ra khi gọi AI. Vui lòng thử lại sau.";

const GREETING: &str = "Xin chào, mình là Glow AI – trợ lý làm đẹp của bạn. \
Mình có thể gợi ý spa, giới thiệu dịch vụ và đặt lịch nhanh cho bạn.";

const QR_LINE: &str = "Bạn sẽ nhận được mã QR check-in ngay trên ứng dụng.";

const RELAX_SERVICES: &[&str] = &["Massage đá nóng", "Massage thư giãn"];
const PREFERRED_RELAX_SPA: &str = "Spa Serenity";

/// (spa, service, promo)
const PROMOS: &[(&str, &str, &str)] = &[("Spa Serenity", "Massage thư giãn", "giảm 20% cho thành viên GlowMeUp")];

const SUGGESTION_LIMIT: usize = 5;
const SUGGESTION_CUTOFF: f64 = 60.0;

const OPEN_REPLY_PROMPT: &str = "Bạn là Glow AI, trợ lý làm đẹp thân thiện của một ứng dụng đặt lịch spa. \
Trả lời ngắn gọn bằng tiếng Việt. Chỉ giới thiệu các spa có trong danh sách dưới đây, \
không bịa ra spa, giá hay khuyến mãi. Với câu hỏi chăm sóc da, đưa lời khuyên an toàn \
và gợi ý gặp chuyên gia khi cần.";

pub(super) fn greeting() -> String {
    GREETING.to_string()
}

pub(super) fn suggest_relax(turn: &mut Turn<'_>) -> anyhow::Result<String> {
    let resolver = &turn.state.resolver;
    let catalog = resolver.catalog();

    let city = turn.slots.city.clone().or_else(|| most_common_city(turn));
    let mut spas: Vec<&str> = city.as_deref().map(|c| resolver.spas_in_city(c)).unwrap_or_default();
    if spas.is_empty() {
        spas = catalog.spa_names().collect();
    }

    let relax_at = |spa: &str| {
        RELAX_SERVICES
            .iter()
            .find(|svc| resolver.spa_offers(spa, svc))
            .map(|svc| svc.to_string())
    };
    let preferred = spas
        .iter()
        .find(|s| **s == PREFERRED_RELAX_SPA)
        .and_then(|s| relax_at(s).map(|svc| (s.to_string(), svc)));
    let pick = preferred
        .or_else(|| spas.iter().find_map(|s| relax_at(s).map(|svc| (s.to_string(), svc))))
        .or_else(|| {
            catalog
                .spas
                .first()
                .and_then(|s| s.services.first().map(|svc| (s.name.clone(), svc.name.clone())))
        });
    let Some((spa, service)) = pick else {
        return Ok("Hiện mình chưa có gợi ý thư giãn nào phù hợp.".to_string());
    };

    let mut ctx = BookingContext::started();
    ctx.set_spa(&spa);
    ctx.set_service(&service);
    turn.booking = ctx;
    turn.save_booking()?;

    let promo = PROMOS
        .iter()
        .find(|(p_spa, p_service, _)| *p_spa == spa && *p_service == service)
        .map(|(_, _, text)| format!(" (ưu đãi: {text})"))
        .unwrap_or_default();

    Ok(format!(
        "Nghe có vẻ bạn đang cần thư giãn một chút. Gợi ý cho bạn: một liệu trình **{service}** tại **{spa}**{promo}.\n\
         Bạn muốn mình kiểm tra lịch trống hôm nay không?"
    ))
}

/// City with the most spas; ties go to the one listed first.
fn most_common_city(turn: &Turn<'_>) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for spa in &turn.state.catalog().spas {
        let Some(city) = spa.city() else { continue };
        match counts.iter_mut().find(|(c, _)| *c == city) {
            Some((_, n)) => *n += 1,
            None => counts.push((city, 1)),
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(String, usize)>, (city, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((city, n)),
        })
        .map(|(city, _)| city)
}

pub(super) fn list_spas(turn: &mut Turn<'_>) -> anyhow::Result<String> {
    let Some(city) = turn.slots.city.as_deref() else {
        return Ok("Bạn muốn tìm spa ở **thành phố** nào ạ?".to_string());
    };
    let resolver = &turn.state.resolver;
    let names: Vec<String> = resolver.spas_in_city(city).into_iter().map(str::to_string).collect();
    if names.is_empty() {
        return Ok(format!("Hiện chưa có spa nào ở **{}** trong hệ thống.", title_case(city)));
    }
    turn.remember_spa_list(&names)?;

    let mut lines = vec![format!("Các spa ở **{}**:", title_case(city))];
    for (i, name) in names.iter().enumerate() {
        let address = resolver.catalog().spa(name).map(|s| s.address.as_str()).unwrap_or_default();
        lines.push(format!("{}. **{name}** – {address}", i + 1));
    }
    lines.push("Trả lời **số thứ tự** để xem chi tiết spa.".to_string());
    Ok(lines.join("\n"))
}

pub(super) fn spa_intro(turn: &mut Turn<'_>) -> anyhow::Result<String> {
    let Some(name) = target_spa(turn) else {
        return ask_for_spa(turn, "Bạn cho mình **tên spa** để giới thiệu chi tiết nhé.");
    };
    let Some(spa) = turn.state.catalog().spa(&name) else {
        return ask_for_spa(turn, "Bạn cho mình **tên spa** để giới thiệu chi tiết nhé.");
    };
    turn.remember_focus(&spa.name)?;

    let mut reply = format!("**{}**\n📍 {}", spa.name, spa.address);
    if !spa.description.is_empty() {
        reply.push_str(&format!("\n{}", spa.description));
    }
    if !spa.services.is_empty() {
        let services: Vec<&str> = spa.services.iter().map(|s| s.name.as_str()).collect();
        reply.push_str(&format!("\nDịch vụ nổi bật: {}.", services.join(", ")));
    }
    Ok(reply)
}

pub(super) fn list_services(turn: &mut Turn<'_>) -> anyhow::Result<String> {
    let Some(name) = target_spa(turn) else {
        return ask_for_spa(turn, "Bạn muốn xem **danh sách dịch vụ** của **spa nào**?");
    };
    let services = turn.state.catalog().services_of(&name);
    if services.is_empty() {
        return Ok(format!("**{name}** hiện chưa cập nhật dịch vụ."));
    }
    turn.remember_focus(&name)?;

    let mut lines = vec![format!("Dịch vụ tại **{name}**:")];
    for (i, svc) in services.iter().enumerate() {
        if svc.description.is_empty() {
            lines.push(format!("{}. **{}**", i + 1, svc.name));
        } else {
            lines.push(format!("{}. **{}** – {}", i + 1, svc.name, svc.description));
        }
    }
    Ok(lines.join("\n"))
}

pub(super) fn service_detail(turn: &mut Turn<'_>) -> anyhow::Result<String> {
    let resolver = &turn.state.resolver;
    let Some(service) = turn.slots.service_name.clone() else {
        return Ok("Bạn cho mình **tên dịch vụ** cụ thể để giới thiệu chi tiết nhé.".to_string());
    };

    let offering = resolver.spas_offering(&service);
    let spa = [turn.slots.spa_name.as_deref(), turn.last_spa_focus.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| resolver.spa_offers(s, &service))
        .map(str::to_string)
        .or_else(|| resolver.find_exact_service_by_name(&service).map(|(spa, _)| spa));
    let Some(spa) = spa else {
        return Ok("Bạn cho mình **tên dịch vụ** cụ thể để giới thiệu chi tiết nhé.".to_string());
    };

    let wanted = normalize(&service);
    let description = resolver
        .catalog()
        .services_of(&spa)
        .iter()
        .find(|s| normalize(&s.name) == wanted)
        .map(|s| s.description.clone())
        .unwrap_or_default();

    turn.remember_context(&LastContext {
        spa_name: Some(spa.clone()),
        service_name: Some(service.clone()),
    })?;
    turn.remember_focus(&spa)?;

    let mut reply = format!("**{service}** tại **{spa}**");
    if !description.is_empty() {
        reply.push_str(&format!("\n{description}"));
    }
    let elsewhere: Vec<&str> = offering.iter().map(String::as_str).filter(|s| *s != spa).collect();
    if !elsewhere.is_empty() {
        reply.push_str(&format!("\nCũng có tại: {}.", elsewhere.join(", ")));
    }
    reply.push_str("\nBạn muốn đặt lịch dịch vụ này không?");
    Ok(reply)
}

pub(super) fn booking(turn: &mut Turn<'_>) -> anyhow::Result<String> {
    let input = BookingTurn {
        message: turn.message,
        nlu: turn.nlu,
        slots: turn.slots,
        last_spa_focus: turn.last_spa_focus.as_deref(),
        last_context: turn.last_context.as_ref(),
        now: turn.now,
    };
    let outcome = booking::advance(&mut turn.booking, &input, &turn.state.resolver);

    tracing::info!(
        user = turn.user_id,
        stage = turn.booking.stage().as_str(),
        "booking advanced"
    );

    match &outcome {
        BookingOutcome::Confirmed(appointment) => {
            // Drop the stored context before writing the appointment, so a
            // failed delete can never leave a confirmable copy behind.
            let mut filled = turn.booking.clone();
            turn.clear_booking()?;
            if let Err(e) = turn.state.appointments.append(turn.user_id, appointment) {
                filled.withdraw_confirmation();
                turn.booking = filled;
                turn.save_booking()?;
                return Err(e);
            }
            tracing::info!(
                user = turn.user_id,
                appointment = %appointment.id,
                spa = %appointment.spa_name,
                "appointment booked"
            );
        }
        BookingOutcome::SuggestSpas(names) | BookingOutcome::ChooseSpa { candidates: names, .. } => {
            turn.remember_spa_list(names)?;
            turn.save_booking()?;
        }
        _ => turn.save_booking()?,
    }

    Ok(render_booking(&outcome))
}

fn render_booking(outcome: &BookingOutcome) -> String {
    match outcome {
        BookingOutcome::ChooseService { candidates } => format!(
            "Bạn muốn đặt dịch vụ nào?\n{}\nTrả lời **số thứ tự** hoặc **tên dịch vụ**.",
            numbered(candidates)
        ),
        BookingOutcome::ChooseSpa { service, candidates } => format!(
            "**{service}** có ở nhiều spa:\n{}\nBạn muốn đặt tại spa nào?",
            numbered(candidates)
        ),
        BookingOutcome::SuggestSpas(names) => format!(
            "Bạn muốn đặt tại spa nào? Có phải:\n{}\nTrả lời **số thứ tự** để chọn.",
            numbered(names)
        ),
        BookingOutcome::AskSpa => "Bạn muốn đặt **dịch vụ gì**, tại **spa nào** và **khi nào** ạ?".to_string(),
        BookingOutcome::ServiceNotOffered { spa, service, services } => format!(
            "**{spa}** chưa có dịch vụ **{service}**. Các dịch vụ tại đây:\n{}\nBạn chọn giúp mình một dịch vụ nhé.",
            numbered(services)
        ),
        BookingOutcome::ChooseServiceAtSpa { spa, services } => format!(
            "Bạn muốn đặt dịch vụ nào tại **{spa}**?\n{}\nTrả lời **số thứ tự** hoặc **tên dịch vụ**.",
            numbered(services)
        ),
        BookingOutcome::ProposeSlots { slots, from_window: true } => format!(
            "Có {} khung giờ khả dụng: {}. Bạn chọn khung nào?",
            slots.len(),
            slots_line(slots)
        ),
        BookingOutcome::ProposeSlots { slots, from_window: false } => {
            let labels: Vec<String> = slots.iter().map(|s| s.label.clone()).collect();
            format!(
                "🗓️ Lịch trống gần nhất:\n{}\nVui lòng chọn số thứ tự (ví dụ: 2), hoặc nhập thời gian bạn muốn (dd/mm/yyyy hh:mm).",
                numbered(&labels)
            )
        }
        BookingOutcome::AskTime { past: true } => {
            "Thời gian đó đã qua rồi. Bạn chọn giúp mình một thời điểm khác nhé.".to_string()
        }
        BookingOutcome::AskTime { past: false } => {
            "Mình chưa rõ bạn chọn khung giờ nào. Bạn nhập giúp thời gian cụ thể (ví dụ: 16:00 hoặc 20/10 14:30) nhé."
                .to_string()
        }
        BookingOutcome::Summary { spa, service, slot } => format!(
            "Xác nhận đặt lịch:\n• Spa: **{spa}**\n• Dịch vụ: **{service}**\n• Thời gian: **{}**\nBạn muốn mình đặt luôn không?",
            slot.label
        ),
        BookingOutcome::Confirmed(appointment) => confirmation(appointment),
    }
}

fn confirmation(appointment: &Appointment) -> String {
    format!(
        "✅ Đã đặt lịch **{}** tại **{}** lúc **{}**. Mã lịch hẹn: {}.\n{QR_LINE}",
        appointment.service_name, appointment.spa_name, appointment.slot_label, appointment.id
    )
}

/// "14:30 hoặc 16:00" for same-day slots, full labels otherwise.
fn slots_line(slots: &[SlotOption]) -> String {
    let same_day = slots
        .windows(2)
        .all(|w| w[0].datetime().map(|d| d.date()) == w[1].datetime().map(|d| d.date()));
    let parts: Vec<String> = slots
        .iter()
        .map(|s| match (same_day, s.hhmm()) {
            (true, Some(hhmm)) => hhmm,
            _ => s.label.clone(),
        })
        .collect();
    parts.join(" hoặc ")
}

pub(super) fn appointment_lookup(turn: &mut Turn<'_>) -> anyhow::Result<String> {
    let store = turn.state.appointments.as_ref();
    let window = turn
        .nlu
        .time_range
        .as_ref()
        .and_then(|r| r.bounds())
        .map(|(start, end)| {
            let title = format!("{} – {}", start.format("%d/%m %H:%M"), end.format("%d/%m %H:%M"));
            (start, end, title)
        })
        .or_else(|| {
            let mentions = turn.state.resolver.spa_mentions(turn.message);
            let masks: Vec<&str> = mentions.iter().map(String::as_str).collect();
            lookup_range(turn.message, turn.now, &masks)
        });

    match window {
        Some((start, end, title)) => {
            let found = list_in_range(store, turn.user_id, start, end)?;
            Ok(render_appointments(&found, &title))
        }
        None => appointment_list_all(turn),
    }
}

pub(super) fn appointment_list_all(turn: &mut Turn<'_>) -> anyhow::Result<String> {
    let all = list_sorted(turn.state.appointments.as_ref(), turn.user_id)?;
    Ok(render_appointments(&all, "tất cả"))
}

fn render_appointments(appointments: &[Appointment], title: &str) -> String {
    if appointments.is_empty() {
        return format!("Bạn chưa có lịch hẹn nào ({title}).");
    }
    let mut lines = vec![format!("📅 **Lịch hẹn ({title})**:")];
    for (i, a) in appointments.iter().enumerate() {
        lines.push(format!(
            "{}. **{}** – {} tại {} (mã {})",
            i + 1,
            a.slot_label,
            a.service_name,
            a.spa_name,
            a.id
        ));
    }
    lines.join("\n")
}

/// Free-form answer from the completion service over the recent history.
/// Any failure yields the apology text.
pub(super) async fn open_reply(turn: &Turn<'_>) -> String {
    let spas: Vec<String> = turn
        .state
        .catalog()
        .spas
        .iter()
        .map(|s| format!("- {} ({})", s.name, s.address))
        .collect();
    let system = format!("{OPEN_REPLY_PROMPT}\n\nDanh sách spa:\n{}", spas.join("\n"));

    let mut messages: Vec<Message> = recent(turn.history, turn.state.config.history_window)
        .iter()
        .map(Message::from)
        .collect();
    messages.push(Message::user(turn.message));

    match turn.state.llm.chat(&system, &messages).await {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        Ok(_) => {
            tracing::warn!(user = turn.user_id, "completion service returned an empty reply");
            APOLOGY.to_string()
        }
        Err(e) => {
            tracing::error!(user = turn.user_id, error = %e, "open reply failed");
            APOLOGY.to_string()
        }
    }
}

/// Spa the turn is about: named in the message, else picked from the last list.
fn target_spa(turn: &Turn<'_>) -> Option<String> {
    turn.slots.spa_name.clone().or_else(|| turn.list_pick.clone())
}

/// No spa resolved: offer close names when there are any, else ask.
fn ask_for_spa(turn: &mut Turn<'_>, question: &str) -> anyhow::Result<String> {
    let suggestions = turn
        .state
        .resolver
        .suggest_spas(turn.message, SUGGESTION_LIMIT, SUGGESTION_CUTOFF);
    if suggestions.is_empty() {
        return Ok(question.to_string());
    }
    turn.remember_spa_list(&suggestions)?;
    Ok(format!(
        "Có phải bạn muốn nói tới:\n{}\nTrả lời **số thứ tự** để chọn.",
        numbered(&suggestions)
    ))
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {item}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// "hà nội" → "Hà Nội"
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
