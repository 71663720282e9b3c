//! Spreadsheet import of faculty timetables.
//!
//! The importer reconciles, it does not gatekeep: courses, teachers, floors
//! and rooms are upserted on the fly and schedule rows land through an
//! unchecked upsert that never consults the conflict detector. Real-world
//! export files contain overlaps; they are imported as-is and resolved
//! afterwards through the normal edit path. Row failures are collected into
//! a categorized report while the loop keeps going.

use std::path::Path;

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{NaiveTime, Utc};
use db::models::class_schedule::{self, DayOfWeek};
use db::models::import_job::{self, ImportStatus};
use db::models::room::{RoomPosition, RoomType};
use db::models::{course, faculty, floor, room, teacher};
use db::slots;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use thiserror::Error;

/// `"<day> HH:MM تا HH:MM"`; the lazy day capture keeps multi-word day
/// names like "سه شنبه" intact.
static CAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.+?)\s+(\d{1,2}:\d{2})\s*تا\s*(\d{1,2}:\d{2})").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonical Persian column names and the header spellings seen in the wild.
const COLUMN_ALIASES: [(&str, &[&str]); 6] = [
    ("کد درس", &["کد درس", "كد درس", "کدِ درس", "Course Code", "کد-درس"]),
    ("نام درس", &["نام درس", "نامِ درس", "Course Name", "عنوان درس"]),
    (
        "تقويم كلاس درس",
        &[
            "تقويم كلاس درس",
            "تقویم کلاس درس",
            "تقويم کلاس درس",
            "تقویمِ کلاس",
            "تقويم",
            "Calendar",
        ],
    ),
    (
        "نام كامل استاد",
        &["نام كامل استاد", "نام کامل استاد", "استاد", "نام استاد", "Teacher Name"],
    ),
    (
        "نام مكان",
        &["نام مكان", "نام مکان", "کلاس", "اتاق", "Room", "Room Name", "محل برگزاری"],
    ),
    (
        "تعداد واحد نظري",
        &["تعداد واحد نظري", "تعداد واحد نظری", "نظری", "Theory Units"],
    ),
];

const UNKNOWN_LABEL: &str = "نامشخص";

/// Normalizes Persian cell text: trim, Arabic ye/kaf to Persian, zero-width
/// and non-breaking spaces to plain spaces, runs of whitespace collapsed.
pub fn normalize_text(value: &str) -> String {
    let text = value
        .trim()
        .replace('\u{064a}', "\u{06cc}")
        .replace('\u{0643}', "\u{06a9}")
        .replace(['\u{200c}', '\u{a0}'], " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Maps a normalized Persian day name onto the schedule weekday.
pub fn day_from_persian(day: &str) -> Option<DayOfWeek> {
    match day {
        "شنبه" => Some(DayOfWeek::Saturday),
        "یکشنبه" => Some(DayOfWeek::Sunday),
        "دوشنبه" => Some(DayOfWeek::Monday),
        // normalization turns the ZWNJ spelling into the spaced one
        "سه شنبه" | "سه‌شنبه" => Some(DayOfWeek::Tuesday),
        "چهارشنبه" => Some(DayOfWeek::Wednesday),
        "پنجشنبه" => Some(DayOfWeek::Thursday),
        "جمعه" => Some(DayOfWeek::Friday),
        _ => None,
    }
}

/// One data row as read from the sheet, already text-normalized.
#[derive(Debug, Clone, Serialize)]
pub struct RawRow {
    /// 1-based sheet row (data starts at 2, after the header).
    pub row: usize,
    pub course_code: String,
    pub course_name: String,
    pub calendar: String,
    pub teacher_name: String,
    pub teacher_code: Option<String>,
    pub room_name: String,
    pub theory_units: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowErrorKind {
    #[serde(rename = "parsing_errors")]
    Parsing,
    #[serde(rename = "missing_course_code")]
    MissingCourseCode,
    #[serde(rename = "invalid_day")]
    InvalidDay,
    #[serde(rename = "room_conflict_errors")]
    RoomConflict,
    #[serde(rename = "teacher_conflict_errors")]
    TeacherConflict,
    #[serde(rename = "time_conflict_errors")]
    TimeConflict,
    #[serde(rename = "duplicate_schedules")]
    Duplicate,
    #[serde(rename = "data_quality_issues")]
    DataQuality,
    #[serde(rename = "invalid_duration")]
    InvalidDuration,
    #[serde(rename = "missing_time_data")]
    MissingTimeData,
}

impl RowErrorKind {
    fn suggestions(self) -> Vec<String> {
        let texts: &[&str] = match self {
            RowErrorKind::Parsing => &[
                "بررسی کنید که فرمت تقویم به صورت 'روز ساعت شروع تا ساعت پایان' باشد",
                "مثال صحیح: 'شنبه 08:00 تا 10:00'",
            ],
            RowErrorKind::MissingCourseCode => &[
                "کد درس نمی‌تواند خالی باشد",
                "لطفاً کد درس را در ستون 'کد درس' وارد کنید",
            ],
            RowErrorKind::InvalidDay => &[
                "روزهای معتبر: شنبه، یکشنبه، دوشنبه، سه‌شنبه، چهارشنبه، پنجشنبه، جمعه",
            ],
            RowErrorKind::RoomConflict => &[
                "این اتاق در این زمان قبلاً رزرو شده است",
                "لطفاً اتاق، روز یا زمان دیگری انتخاب کنید",
            ],
            RowErrorKind::TeacherConflict => &[
                "این استاد در این زمان کلاس دیگری دارد",
                "لطفاً استاد، روز یا زمان دیگری انتخاب کنید",
            ],
            RowErrorKind::TimeConflict => &[
                "تداخل زمانی در برنامه‌ریزی کلاس‌ها",
                "لطفاً زمان‌های کلاس‌ها را بررسی کنید",
            ],
            RowErrorKind::Duplicate => &[
                "این برنامه کلاسی قبلاً وجود دارد",
                "در صورت نیاز، از گزینه 'بروزرسانی' استفاده کنید",
            ],
            RowErrorKind::DataQuality => &[
                "کیفیت داده‌ها را بررسی کنید",
                "اطمینان حاصل کنید که تمام فیلدهای ضروری پر شده باشند",
            ],
            RowErrorKind::InvalidDuration => &[
                "مدت زمان کلاس باید بین 30 دقیقه تا 6 ساعت باشد",
                "بررسی کنید که ساعت شروع و پایان صحیح باشد",
            ],
            RowErrorKind::MissingTimeData => &[
                "ساعت شروع و پایان کلاس باید مشخص باشد",
                "بررسی کنید که ستون تقویم کلاس درس پر شده باشد",
            ],
        };
        texts.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub row: usize,
    pub error_type: RowErrorKind,
    pub error_message: String,
    pub raw_data: RawRow,
    pub suggestions: Vec<String>,
}

impl RowError {
    fn new(kind: RowErrorKind, message: impl Into<String>, raw: &RawRow) -> Self {
        Self {
            row: raw.row,
            error_type: kind,
            error_message: message.into(),
            raw_data: raw.clone(),
            suggestions: kind.suggestions(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),
    #[error("workbook contains no sheets")]
    EmptyWorkbook,
    #[error("required columns not found: {}; available: {}", missing.join(", "), available.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },
    #[error("faculty {0} not found")]
    FacultyNotFound(i64),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub faculty_id: i64,
    pub semester: String,
    pub academic_year: String,
    pub dry_run: bool,
}

/// Per-entity upsert counters for the import report.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    pub courses_created: u32,
    pub courses_updated: u32,
    pub teachers_created: u32,
    pub teachers_updated: u32,
    pub floors_created: u32,
    pub rooms_created: u32,
    pub rooms_updated: u32,
    pub schedules_created: u32,
    pub schedules_updated: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub job_id: i64,
    pub total: u32,
    pub inserted: u32,
    pub updated: u32,
    pub errors: Vec<RowError>,
    pub dry_run: bool,
    pub stats: ImportStats,
}

/// Reads an Excel timetable and imports it. See [`import_rows`] for the
/// reconciliation rules.
pub async fn import_schedules(
    db: &DatabaseConnection,
    path: &Path,
    request: &ImportRequest,
) -> Result<ImportOutcome, ImportError> {
    let rows = read_workbook(path)?;
    import_rows(db, &path.to_string_lossy(), rows, request).await
}

/// Imports already-parsed rows.
///
/// The whole data pass runs in one transaction; a dry run performs every
/// upsert and then rolls back unconditionally. The audit row lives outside
/// that transaction so the report survives the rollback.
pub async fn import_rows(
    db: &DatabaseConnection,
    source_name: &str,
    rows: Vec<RawRow>,
    request: &ImportRequest,
) -> Result<ImportOutcome, ImportError> {
    let faculty = faculty::Entity::find_by_id(request.faculty_id)
        .one(db)
        .await?
        .ok_or(ImportError::FacultyNotFound(request.faculty_id))?;

    let job = import_job::ActiveModel {
        faculty_id: Set(faculty.id),
        semester: Set(request.semester.clone()),
        academic_year: Set(request.academic_year.clone()),
        source_filename: Set(source_name.to_string()),
        total: Set(0),
        inserted: Set(0),
        updated: Set(0),
        errors_json: Set(serde_json::Value::Array(vec![])),
        dry_run: Set(request.dry_run),
        status: Set(ImportStatus::Pending),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut report = Report::default();
    let run = run_rows(db, &faculty, request, rows, &mut report).await;

    let errors_json = serde_json::to_value(&report.errors)
        .unwrap_or_else(|_| serde_json::Value::Array(vec![]));
    let mut audit: import_job::ActiveModel = job.clone().into();
    audit.status = Set(if run.is_ok() {
        ImportStatus::Completed
    } else {
        ImportStatus::Failed
    });
    audit.total = Set(report.total as i32);
    audit.inserted = Set(report.inserted as i32);
    audit.updated = Set(report.updated as i32);
    audit.errors_json = Set(errors_json);
    audit.update(db).await?;
    run?;

    log::info!(
        "import of {source_name}: {} rows, {} inserted, {} updated, {} errors{}",
        report.total,
        report.inserted,
        report.updated,
        report.errors.len(),
        if request.dry_run { " (dry run, rolled back)" } else { "" },
    );

    Ok(ImportOutcome {
        job_id: job.id,
        total: report.total,
        inserted: report.inserted,
        updated: report.updated,
        errors: report.errors,
        dry_run: request.dry_run,
        stats: report.stats,
    })
}

#[derive(Default)]
struct Report {
    total: u32,
    inserted: u32,
    updated: u32,
    errors: Vec<RowError>,
    stats: ImportStats,
}

enum RowAction {
    Inserted,
    Updated,
}

enum RowFailure {
    Row(Box<RowError>),
    Db(DbErr),
}

impl From<DbErr> for RowFailure {
    fn from(err: DbErr) -> Self {
        RowFailure::Db(err)
    }
}

async fn run_rows(
    db: &DatabaseConnection,
    faculty: &faculty::Model,
    request: &ImportRequest,
    rows: Vec<RawRow>,
    report: &mut Report,
) -> Result<(), ImportError> {
    let txn = db.begin().await?;
    for row in rows {
        report.total += 1;
        match process_row(&txn, faculty, request, &row, &mut report.stats).await {
            Ok(RowAction::Inserted) => report.inserted += 1,
            Ok(RowAction::Updated) => report.updated += 1,
            Err(RowFailure::Row(error)) => {
                log::warn!("import row {} failed: {}", error.row, error.error_message);
                report.errors.push(*error);
            }
            Err(RowFailure::Db(err)) => {
                txn.rollback().await.ok();
                return Err(err.into());
            }
        }
    }
    if request.dry_run {
        txn.rollback().await?;
    } else {
        txn.commit().await?;
    }
    Ok(())
}

async fn process_row<C>(
    txn: &C,
    faculty: &faculty::Model,
    request: &ImportRequest,
    raw: &RawRow,
    stats: &mut ImportStats,
) -> Result<RowAction, RowFailure>
where
    C: ConnectionTrait,
{
    let fail = |kind: RowErrorKind, message: String| {
        RowFailure::Row(Box::new(RowError::new(kind, message, raw)))
    };

    if raw.course_code.is_empty() {
        return Err(fail(RowErrorKind::MissingCourseCode, "کد درس خالی است".into()));
    }

    let calendar = raw.calendar.trim_end_matches(['؛', ';', ' ']);
    let captures = CAL_REGEX
        .captures(calendar)
        .ok_or_else(|| fail(RowErrorKind::Parsing, format!("قالب تقویم نامعتبر: {calendar}")))?;
    let day_fa = captures[1].trim();
    let day = day_from_persian(day_fa)
        .ok_or_else(|| fail(RowErrorKind::InvalidDay, format!("روز نامعتبر: {day_fa}")))?;
    let start = parse_time(&captures[2])
        .ok_or_else(|| fail(RowErrorKind::Parsing, format!("ساعت نامعتبر: {}", &captures[2])))?;
    let end = parse_time(&captures[3])
        .ok_or_else(|| fail(RowErrorKind::Parsing, format!("ساعت نامعتبر: {}", &captures[3])))?;

    if slots::minutes_of(end) <= slots::minutes_of(start) {
        return Err(fail(
            RowErrorKind::DataQuality,
            "ساعت پایان باید بعد از ساعت شروع باشد".into(),
        ));
    }
    let minutes = slots::duration_minutes(start, end);
    if minutes < 30 {
        return Err(fail(
            RowErrorKind::InvalidDuration,
            "مدت زمان کلاس باید حداقل 30 دقیقه باشد".into(),
        ));
    }
    if minutes > 360 {
        return Err(fail(
            RowErrorKind::InvalidDuration,
            "مدت زمان کلاس نمی‌تواند بیش از 6 ساعت باشد".into(),
        ));
    }

    let credit_hours = parse_units(&raw.theory_units).max(1);
    let course = upsert_course(txn, faculty, raw, credit_hours, stats).await?;
    let teacher = upsert_teacher(txn, faculty, raw, stats).await?;

    let room_name = if raw.room_name.is_empty() {
        UNKNOWN_LABEL.to_string()
    } else {
        raw.room_name.clone()
    };
    let room = upsert_room(txn, faculty, &room_name, stats).await?;

    // upsert keyed by (room, day, start, end, semester)
    let existing = class_schedule::Entity::find()
        .filter(class_schedule::Column::RoomId.eq(room.id))
        .filter(class_schedule::Column::DayOfWeek.eq(day))
        .filter(class_schedule::Column::StartTime.eq(start))
        .filter(class_schedule::Column::EndTime.eq(end))
        .filter(class_schedule::Column::Semester.eq(request.semester.as_str()))
        .one(txn)
        .await?;

    let now = Utc::now();
    match existing {
        Some(schedule) => {
            let mut active: class_schedule::ActiveModel = schedule.into();
            active.course_id = Set(course.id);
            active.teacher_id = Set(Some(teacher.id));
            active.academic_year = Set(request.academic_year.clone());
            active.is_active = Set(true);
            active.updated_at = Set(now);
            active.update(txn).await?;
            stats.schedules_updated += 1;
            Ok(RowAction::Updated)
        }
        None => {
            let insert = class_schedule::ActiveModel {
                course_id: Set(course.id),
                room_id: Set(room.id),
                teacher_id: Set(Some(teacher.id)),
                day_of_week: Set(day),
                start_time: Set(Some(start)),
                end_time: Set(Some(end)),
                time_slot: Set(slots::derive_time_slot(start, end).map(str::to_string)),
                semester: Set(request.semester.clone()),
                academic_year: Set(request.academic_year.clone()),
                notes: Set(None),
                is_holding: Set(true),
                cancelled_at: Set(None),
                student_reported_not_holding: Set(false),
                not_holding_reported_at: Set(None),
                student_reported_holding: Set(false),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await;
            match insert {
                Ok(_) => {
                    stats.schedules_created += 1;
                    Ok(RowAction::Inserted)
                }
                Err(err)
                    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
                {
                    Err(fail(
                        RowErrorKind::Duplicate,
                        "این برنامه کلاسی قبلاً وجود دارد".into(),
                    ))
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

async fn upsert_course<C>(
    txn: &C,
    faculty: &faculty::Model,
    raw: &RawRow,
    credit_hours: i32,
    stats: &mut ImportStats,
) -> Result<course::Model, DbErr>
where
    C: ConnectionTrait,
{
    let name = if raw.course_name.is_empty() {
        raw.course_code.clone()
    } else {
        raw.course_name.clone()
    };
    let now = Utc::now();
    match course::Entity::find()
        .filter(course::Column::Code.eq(raw.course_code.as_str()))
        .one(txn)
        .await?
    {
        Some(existing) => {
            let mut active: course::ActiveModel = existing.into();
            active.name = Set(name);
            active.credit_hours = Set(credit_hours);
            active.faculty_id = Set(Some(faculty.id));
            active.is_active = Set(true);
            active.updated_at = Set(now);
            let updated = active.update(txn).await?;
            stats.courses_updated += 1;
            Ok(updated)
        }
        None => {
            let created = course::ActiveModel {
                faculty_id: Set(Some(faculty.id)),
                code: Set(raw.course_code.clone()),
                name: Set(name),
                credit_hours: Set(credit_hours),
                description: Set(None),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            stats.courses_created += 1;
            Ok(created)
        }
    }
}

async fn upsert_teacher<C>(
    txn: &C,
    faculty: &faculty::Model,
    raw: &RawRow,
    stats: &mut ImportStats,
) -> Result<teacher::Model, DbErr>
where
    C: ConnectionTrait,
{
    let mut name = raw.teacher_name.clone();
    let code = raw.teacher_code.as_deref().filter(|c| !c.is_empty());
    if name.is_empty() {
        if let Some(code) = code {
            name = code.to_string();
        } else {
            name = UNKNOWN_LABEL.to_string();
            log::warn!("import row {}: teacher name is empty, using default", raw.row);
        }
    }
    let now = Utc::now();

    // match by staff code when present, otherwise by name within the faculty
    let existing = match code {
        Some(code) => {
            teacher::Entity::find()
                .filter(teacher::Column::FacultyId.eq(faculty.id))
                .filter(teacher::Column::PhoneNumber.eq(code))
                .one(txn)
                .await?
        }
        None => {
            teacher::Entity::find()
                .filter(teacher::Column::FacultyId.eq(faculty.id))
                .filter(teacher::Column::FullName.eq(name.as_str()))
                .one(txn)
                .await?
        }
    };

    match existing {
        Some(existing) => {
            let needs_update = existing.full_name != name
                || (code.is_some() && existing.phone_number.as_deref() != code);
            let model = if needs_update {
                let mut active: teacher::ActiveModel = existing.into();
                active.full_name = Set(name);
                if let Some(code) = code {
                    active.phone_number = Set(Some(code.to_string()));
                }
                active.updated_at = Set(now);
                active.update(txn).await?
            } else {
                existing
            };
            stats.teachers_updated += 1;
            Ok(model)
        }
        None => {
            let created = teacher::ActiveModel {
                faculty_id: Set(Some(faculty.id)),
                full_name: Set(name),
                email: Set(None),
                phone_number: Set(code.map(str::to_string)),
                specialization: Set(None),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            stats.teachers_created += 1;
            Ok(created)
        }
    }
}

async fn upsert_room<C>(
    txn: &C,
    faculty: &faculty::Model,
    room_name: &str,
    stats: &mut ImportStats,
) -> Result<room::Model, DbErr>
where
    C: ConnectionTrait,
{
    let floor_number = floor_of_room(room_name);
    let floor = match floor::Entity::find()
        .filter(floor::Column::FacultyId.eq(faculty.id))
        .filter(floor::Column::FloorNumber.eq(floor_number))
        .one(txn)
        .await?
    {
        Some(floor) => floor,
        None => {
            let name = if floor_number > 0 {
                format!("طبقه {floor_number}")
            } else {
                UNKNOWN_LABEL.to_string()
            };
            let created = floor::ActiveModel {
                faculty_id: Set(Some(faculty.id)),
                floor_number: Set(floor_number),
                name: Set(name),
                description: Set(None),
                is_active: Set(true),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            stats.floors_created += 1;
            created
        }
    };

    match room::Entity::find()
        .filter(room::Column::FloorId.eq(floor.id))
        .filter(room::Column::RoomNumber.eq(room_name))
        .one(txn)
        .await?
    {
        Some(existing) => {
            stats.rooms_updated += 1;
            Ok(existing)
        }
        None => {
            let now = Utc::now();
            let created = room::ActiveModel {
                floor_id: Set(floor.id),
                room_number: Set(room_name.to_string()),
                room_type: Set(RoomType::Classroom),
                position: Set(RoomPosition::Left),
                is_active: Set(true),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            stats.rooms_created += 1;
            Ok(created)
        }
    }
}

/// The floor is the tens digit of the room number: 318 is on floor 1,
/// 324 on floor 2. Single-digit and non-numeric rooms go to floor 0.
pub fn floor_of_room(room_name: &str) -> i32 {
    match leading_number(room_name) {
        Some(num) if num >= 10 => ((num / 10) % 10) as i32,
        _ => 0,
    }
}

fn digit_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => Some(c as u32 - '0' as u32),
        // Persian and Arabic-Indic digits
        '\u{06f0}'..='\u{06f9}' => Some(c as u32 - 0x06f0),
        '\u{0660}'..='\u{0669}' => Some(c as u32 - 0x0660),
        _ => None,
    }
}

/// First run of digits in the string, read as a number. Stops once the
/// value would no longer fit, so junk cells full of digits stay harmless.
fn leading_number(text: &str) -> Option<u32> {
    let mut value: Option<u32> = None;
    for c in text.chars() {
        match digit_value(c) {
            Some(d) => {
                match value.unwrap_or(0).checked_mul(10).and_then(|v| v.checked_add(d)) {
                    Some(v) => value = Some(v),
                    None => break,
                }
            }
            None if value.is_some() => break,
            None => {}
        }
    }
    value
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

fn parse_units(value: &str) -> i32 {
    value.trim().parse::<f64>().map(|f| f as i32).unwrap_or(0)
}

/// Opens the workbook and extracts normalized rows from "Sheet1", falling
/// back to the first sheet.
pub fn read_workbook(path: &Path) -> Result<Vec<RawRow>, ImportError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = match workbook.worksheet_range("Sheet1") {
        Ok(range) => range,
        Err(_) => {
            let first = workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or(ImportError::EmptyWorkbook)?;
            workbook.worksheet_range(&first)?
        }
    };
    parse_range(&range)
}

fn parse_range(range: &Range<Data>) -> Result<Vec<RawRow>, ImportError> {
    let mut rows_iter = range.rows();
    let header = rows_iter.next().ok_or(ImportError::EmptyWorkbook)?;
    let headers: Vec<String> = header.iter().map(|c| normalize_text(&cell_text(c))).collect();

    let mut indices: [Option<usize>; 6] = [None; 6];
    for (slot, (_, aliases)) in COLUMN_ALIASES.iter().enumerate() {
        for alias in *aliases {
            let wanted = normalize_text(alias);
            if let Some(pos) = headers.iter().position(|h| *h == wanted) {
                indices[slot] = Some(pos);
                break;
            }
        }
    }
    let missing: Vec<String> = COLUMN_ALIASES
        .iter()
        .zip(&indices)
        .filter(|(_, idx)| idx.is_none())
        .map(|((canonical, _), _)| canonical.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns {
            missing,
            available: headers,
        });
    }

    let mut rows = Vec::new();
    for (offset, row) in rows_iter.enumerate() {
        let cell = |slot: usize| -> String {
            indices[slot]
                .and_then(|pos| row.get(pos))
                .map(cell_text)
                .unwrap_or_default()
        };
        rows.push(RawRow {
            row: offset + 2,
            course_code: normalize_text(&cell(0)),
            course_name: normalize_text(&cell(1)),
            calendar: normalize_text(&cell(2)),
            teacher_name: normalize_text(&cell(3)),
            teacher_code: None,
            room_name: normalize_text(&cell(4)),
            theory_units: normalize_text(&cell(5)),
        });
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Excel stores numeric course codes as floats
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule_service::{create_schedule, ScheduleError, ScheduleInput};
    use crate::test_support::time;
    use db::models::faculty;
    use db::test_utils::setup_test_db;
    use sea_orm::PaginatorTrait;

    async fn seed_faculty(db: &DatabaseConnection) -> faculty::Model {
        let now = Utc::now();
        faculty::ActiveModel {
            code: Set("ai".to_string()),
            name: Set("دانشکده هوش مصنوعی".to_string()),
            image_name: Set(None),
            description: Set(None),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    fn request(faculty_id: i64, dry_run: bool) -> ImportRequest {
        ImportRequest {
            faculty_id,
            semester: "اول".to_string(),
            academic_year: "1404-1405".to_string(),
            dry_run,
        }
    }

    fn raw(row: usize, code: &str, name: &str, calendar: &str, teacher: &str, room: &str) -> RawRow {
        RawRow {
            row,
            course_code: normalize_text(code),
            course_name: normalize_text(name),
            calendar: normalize_text(calendar),
            teacher_name: normalize_text(teacher),
            teacher_code: None,
            room_name: normalize_text(room),
            theory_units: "3".to_string(),
        }
    }

    #[test]
    fn normalization_unifies_arabic_forms() {
        assert_eq!(normalize_text("كد  درس"), "کد درس");
        assert_eq!(normalize_text("سه\u{200c}شنبه"), "سه شنبه");
        assert_eq!(normalize_text("  نام\u{a0}مكان "), "نام مکان");
    }

    #[test]
    fn calendar_regex_handles_spaced_day_names() {
        let caps = CAL_REGEX.captures("سه شنبه 8:00 تا 10:30").unwrap();
        assert_eq!(caps[1].trim(), "سه شنبه");
        assert_eq!(&caps[2], "8:00");
        assert_eq!(&caps[3], "10:30");
        assert_eq!(day_from_persian(caps[1].trim()), Some(DayOfWeek::Tuesday));
    }

    #[test]
    fn floor_is_tens_digit_of_room_number() {
        assert_eq!(floor_of_room("318"), 1);
        assert_eq!(floor_of_room("324"), 2);
        assert_eq!(floor_of_room("389"), 8);
        assert_eq!(floor_of_room("7"), 0);
        assert_eq!(floor_of_room("کارگاه 215"), 1);
        assert_eq!(floor_of_room("نامشخص"), 0);
        // digit runs too long for u32 stop at the last digit that fits
        assert_eq!(floor_of_room("99999999999999999999"), 9);
    }

    #[tokio::test]
    async fn import_creates_entities_and_schedules() {
        let db = setup_test_db().await;
        let faculty = seed_faculty(&db).await;

        let rows = vec![
            raw(2, "1912045", "مبانی کامپیوتر", "شنبه 08:00 تا 10:00", "دکتر احمدی", "318"),
            raw(3, "1912046", "ساختمان داده", "یکشنبه 10:00 تا 12:00", "دکتر احمدی", "324"),
        ];
        let outcome = import_rows(&db, "ai.xlsx", rows, &request(faculty.id, false))
            .await
            .unwrap();

        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.updated, 0);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.stats.courses_created, 2);
        assert_eq!(outcome.stats.teachers_created, 1);
        assert_eq!(outcome.stats.teachers_updated, 1);
        assert_eq!(outcome.stats.floors_created, 2);

        let floors = floor::Entity::find().all(&db).await.unwrap();
        let numbers: Vec<i32> = floors.iter().map(|f| f.floor_number).collect();
        assert!(numbers.contains(&1) && numbers.contains(&2));

        // rooms inherit the faculty from their floor
        let rooms = room::Entity::find().all(&db).await.unwrap();
        assert!(rooms.iter().all(|r| r.faculty_id == Some(faculty.id)));
    }

    #[tokio::test]
    async fn import_bypasses_conflict_checks_but_editor_does_not() {
        let db = setup_test_db().await;
        let faculty = seed_faculty(&db).await;

        // two overlapping classes in the same room
        let rows = vec![
            raw(2, "1912045", "مبانی کامپیوتر", "شنبه 08:00 تا 10:00", "دکتر احمدی", "318"),
            raw(3, "1912046", "ساختمان داده", "شنبه 09:00 تا 11:00", "دکتر رضایی", "318"),
        ];
        let outcome = import_rows(&db, "ai.xlsx", rows, &request(faculty.id, false))
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 2);
        assert!(outcome.errors.is_empty());

        // the normal edit path still rejects a third overlap
        let the_room = room::Entity::find().one(&db).await.unwrap().unwrap();
        let a_course = course::Entity::find().one(&db).await.unwrap().unwrap();
        let result = create_schedule(
            &db,
            ScheduleInput {
                course_id: a_course.id,
                room_id: the_room.id,
                teacher_id: None,
                day_of_week: DayOfWeek::Saturday,
                start_time: Some(time("09:30")),
                end_time: Some(time("11:30")),
                time_slot: None,
                semester: "اول".to_string(),
                academic_year: "1404-1405".to_string(),
                notes: None,
            },
        )
        .await;
        assert!(matches!(result, Err(ScheduleError::RoomConflict(_))));
    }

    #[tokio::test]
    async fn second_import_run_is_idempotent() {
        let db = setup_test_db().await;
        let faculty = seed_faculty(&db).await;
        let rows = || {
            vec![
                raw(2, "1912045", "مبانی کامپیوتر", "دوشنبه 08:00 تا 10:00", "دکتر احمدی", "101"),
                raw(3, "1912046", "ساختمان داده", "دوشنبه 10:00 تا 12:00", "دکتر احمدی", "101"),
            ]
        };

        let first = import_rows(&db, "ai.xlsx", rows(), &request(faculty.id, false))
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);

        let second = import_rows(&db, "ai.xlsx", rows(), &request(faculty.id, false))
            .await
            .unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(
            class_schedule::Entity::find().count(&db).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn row_errors_are_categorized_and_do_not_stop_the_run() {
        let db = setup_test_db().await;
        let faculty = seed_faculty(&db).await;

        let rows = vec![
            raw(2, "", "بی‌کد", "شنبه 08:00 تا 10:00", "دکتر احمدی", "101"),
            raw(3, "1912050", "تقویم خراب", "هر روز صبح", "دکتر احمدی", "102"),
            raw(4, "1912051", "روز نامعتبر", "آدینه 08:00 تا 10:00", "دکتر احمدی", "103"),
            raw(5, "1912052", "خیلی کوتاه", "شنبه 08:00 تا 08:20", "دکتر احمدی", "104"),
            raw(6, "1912053", "درست", "شنبه 10:00 تا 12:00", "دکتر احمدی", "105"),
        ];
        let outcome = import_rows(&db, "ai.xlsx", rows, &request(faculty.id, false))
            .await
            .unwrap();

        assert_eq!(outcome.total, 5);
        assert_eq!(outcome.inserted, 1);
        let kinds: Vec<RowErrorKind> = outcome.errors.iter().map(|e| e.error_type).collect();
        assert_eq!(
            kinds,
            vec![
                RowErrorKind::MissingCourseCode,
                RowErrorKind::Parsing,
                RowErrorKind::InvalidDay,
                RowErrorKind::InvalidDuration,
            ]
        );
        assert!(outcome.errors.iter().all(|e| !e.suggestions.is_empty()));
    }

    #[tokio::test]
    async fn dry_run_rolls_back_data_but_keeps_the_audit_row() {
        let db = setup_test_db().await;
        let faculty = seed_faculty(&db).await;

        let rows = vec![raw(
            2,
            "1912045",
            "مبانی کامپیوتر",
            "پنجشنبه 08:00 تا 10:00",
            "دکتر احمدی",
            "210",
        )];
        let outcome = import_rows(&db, "ai.xlsx", rows, &request(faculty.id, true))
            .await
            .unwrap();
        assert!(outcome.dry_run);
        assert_eq!(outcome.inserted, 1);

        // everything the run touched is gone
        assert_eq!(class_schedule::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(course::Entity::find().count(&db).await.unwrap(), 0);
        assert_eq!(room::Entity::find().count(&db).await.unwrap(), 0);

        // the audit row survives with the full report
        let job = import_job::Entity::find_by_id(outcome.job_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(job.dry_run);
        assert_eq!(job.status, ImportStatus::Completed);
        assert_eq!(job.inserted, 1);
    }

    #[tokio::test]
    async fn unknown_faculty_is_rejected() {
        let db = setup_test_db().await;
        match import_rows(&db, "ai.xlsx", vec![], &request(999, false)).await {
            Err(ImportError::FacultyNotFound(999)) => {}
            other => panic!("expected missing faculty error, got {other:?}"),
        }
    }
}
