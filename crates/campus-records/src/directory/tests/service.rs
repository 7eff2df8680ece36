use super::common::*;

use crate::directory::{CurriculumSlot, NewProgramme, NewStudent, UserCategory};
use crate::ids::ProgrammeId;
use crate::records_error::{Conflict, ErrorKind, Precondition, RecordsError, Violation};

#[test]
fn users_younger_than_sixteen_are_rejected() {
    let campus = campus();
    let actor = registrar(&campus);

    let mut minor = new_user("young", UserCategory::Student);
    minor.date_of_birth = Some(date(2010, 1, 1));
    let err = campus
        .directory
        .create_user(actor, minor)
        .expect_err("underage user");

    assert!(matches!(
        err,
        RecordsError::Validation(Violation::Underage { minimum: 16 })
    ));
}

#[test]
fn duplicate_usernames_conflict() {
    let campus = campus();
    let actor = registrar(&campus);

    let err = campus
        .directory
        .create_user(actor, new_user("registrar", UserCategory::Staff))
        .expect_err("username taken");

    assert!(matches!(
        err,
        RecordsError::Conflict {
            conflict: Conflict::DuplicateUsername,
            ..
        }
    ));
}

#[test]
fn codes_are_normalised_and_collisions_conflict_on_update() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, " sci ");
    assert_eq!(science.code, "SCI");

    let arts = faculty(&campus, actor, "ART");
    let mut update = crate::directory::NewFaculty {
        name: arts.name.clone(),
        code: "sci".to_string(),
        description: String::new(),
        dean: None,
        established_date: arts.established_date,
    };
    let err = campus
        .directory
        .update_faculty(actor, arts.id, update.clone())
        .expect_err("code collides");
    assert_eq!(err.code(), "code_conflict");

    update.code = "HUM".to_string();
    let renamed = campus
        .directory
        .update_faculty(actor, arts.id, update)
        .expect("free code accepted");
    assert_eq!(renamed.code, "HUM");
}

#[test]
fn moving_a_department_refreshes_programme_faculty() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, "SCI");
    let engineering = faculty(&campus, actor, "ENG");
    let computing = department(&campus, actor, science.id, "CS");
    let programme = programme(&campus, actor, computing.id, "BSC-CS");
    assert_eq!(programme.faculty, science.id);

    campus
        .directory
        .update_department(actor, computing.id, new_department(engineering.id, "CS"))
        .expect("department moved");

    let listing = campus
        .directory
        .context()
        .lookup(|tables| Ok(tables.programmes.fetch(programme.id)?.faculty))
        .expect("programme readable");
    assert_eq!(listing, engineering.id);
}

#[test]
fn inactive_department_cannot_own_new_programmes() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, "SCI");
    let computing = department(&campus, actor, science.id, "CS");
    campus
        .directory
        .deactivate_department(actor, computing.id)
        .expect("deactivated");

    let err = campus
        .directory
        .create_programme(actor, new_programme(computing.id, "BSC-CS"))
        .expect_err("inactive department");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn prerequisite_cycles_are_refused() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, "SCI");
    let computing = department(&campus, actor, science.id, "CS");
    let intro = campus
        .directory
        .create_course(actor, new_course(computing.id, "C101"))
        .expect("course");
    let data = campus
        .directory
        .create_course(actor, new_course(computing.id, "C201"))
        .expect("course");
    let systems = campus
        .directory
        .create_course(actor, new_course(computing.id, "C301"))
        .expect("course");

    campus
        .directory
        .add_prerequisite(actor, data.id, intro.id)
        .expect("C101 before C201");
    campus
        .directory
        .add_prerequisite(actor, systems.id, data.id)
        .expect("C201 before C301");

    let err = campus
        .directory
        .add_prerequisite(actor, intro.id, systems.id)
        .expect_err("cycle");
    assert!(matches!(
        err,
        RecordsError::Precondition(Precondition::CycleDetected { ref course, ref prerequisite })
            if course == "C101" && prerequisite == "C301"
    ));
}

#[test]
fn curriculum_upsert_is_idempotent_and_bounded_by_programme_shape() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, "SCI");
    let computing = department(&campus, actor, science.id, "CS");
    let programme = programme(&campus, actor, computing.id, "BSC-CS");
    let course = campus
        .directory
        .create_course(actor, new_course(computing.id, "C101"))
        .expect("course");

    let slot = CurriculumSlot {
        programme: programme.id,
        course: course.id,
        year: 1,
        semester: 1,
        is_mandatory: true,
    };
    let first = campus
        .directory
        .upsert_curriculum(actor, slot)
        .expect("first upsert");
    let second = campus
        .directory
        .upsert_curriculum(
            actor,
            CurriculumSlot {
                is_mandatory: false,
                ..slot
            },
        )
        .expect("second upsert");

    assert_eq!(first.id, second.id);
    assert!(!second.is_mandatory);
    assert_eq!(
        campus.directory.curriculum(programme.id).expect("curriculum").len(),
        1
    );

    let err = campus
        .directory
        .upsert_curriculum(
            actor,
            CurriculumSlot {
                semester: 3,
                ..slot
            },
        )
        .expect_err("two-semester programme");
    assert_eq!(err.code(), "out_of_range");
}

#[test]
fn only_student_accounts_get_student_profiles() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, "SCI");
    let computing = department(&campus, actor, science.id, "CS");
    let programme = programme(&campus, actor, computing.id, "BSC-CS");
    let lecturer = user(&campus, actor, "lecturer", UserCategory::Lecturer);

    let err = campus
        .directory
        .register_student(
            actor,
            NewStudent {
                user: lecturer.id,
                student_number: "SCT-0001".to_string(),
                programme: programme.id,
                current_year: 1,
                current_semester: 1,
                admission_date: date(2024, 9, 2),
                admission_type: crate::directory::AdmissionType::Direct,
                sponsor: crate::directory::SponsorType::SelfSponsored,
                guardian: Default::default(),
            },
        )
        .expect_err("lecturer account");
    assert_eq!(err.code(), "category_mismatch");
}

#[test]
fn standing_must_fit_the_programme() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, "SCI");
    let computing = department(&campus, actor, science.id, "CS");
    let programme = programme(&campus, actor, computing.id, "BSC-CS");
    let enrolled = student(&campus, actor, programme.id, "SCT-0001");

    let err = campus
        .directory
        .update_student_standing(actor, enrolled.id, 1, 3)
        .expect_err("no third semester");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let moved = campus
        .directory
        .update_student_standing(actor, enrolled.id, 2, 2)
        .expect("valid standing");
    assert_eq!((moved.current_year, moved.current_semester), (2, 2));
}

#[test]
fn programmes_cannot_shrink_below_their_students_or_curriculum() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, "SCI");
    let computing = department(&campus, actor, science.id, "CS");
    let programme = programme(&campus, actor, computing.id, "BSC-CS");
    let enrolled = student(&campus, actor, programme.id, "SCT-0001");
    campus
        .directory
        .update_student_standing(actor, enrolled.id, 3, 2)
        .expect("final year");

    let shorter = NewProgramme {
        duration_years: 1,
        total_semesters: 2,
        ..new_programme(computing.id, "BSC-CS")
    };
    let err = campus
        .directory
        .update_programme(actor, programme.id, shorter.clone())
        .expect_err("student in year 3");
    assert!(matches!(
        err,
        RecordsError::Precondition(Precondition::ProgrammeStructureInUse { year: 3, .. })
    ));
    let stored = campus
        .context()
        .lookup(|tables| Ok(tables.programmes.fetch(programme.id)?.duration_years))
        .expect("programme");
    assert_eq!(stored, 3);

    campus
        .directory
        .update_student_standing(actor, enrolled.id, 1, 1)
        .expect("back to first year");
    let course = campus
        .directory
        .create_course(actor, new_course(computing.id, "C201"))
        .expect("course");
    campus
        .directory
        .upsert_curriculum(
            actor,
            CurriculumSlot {
                programme: programme.id,
                course: course.id,
                year: 2,
                semester: 1,
                is_mandatory: true,
            },
        )
        .expect("curriculum");

    let err = campus
        .directory
        .update_programme(actor, programme.id, shorter)
        .expect_err("curriculum in year 2");
    assert_eq!(err.code(), "programme_structure_in_use");

    let two_years = NewProgramme {
        duration_years: 2,
        total_semesters: 4,
        ..new_programme(computing.id, "BSC-CS")
    };
    let updated = campus
        .directory
        .update_programme(actor, programme.id, two_years)
        .expect("everything still fits");
    assert_eq!(updated.duration_years, 2);
}

#[test]
fn programme_listing_is_ordered_by_student_number() {
    let campus = campus();
    let actor = registrar(&campus);
    let science = faculty(&campus, actor, "SCI");
    let computing = department(&campus, actor, science.id, "CS");
    let programme = programme(&campus, actor, computing.id, "BSC-CS");
    student(&campus, actor, programme.id, "SCT-0002");
    student(&campus, actor, programme.id, "SCT-0001");

    let listing = campus
        .directory
        .students_by_programme(programme.id)
        .expect("listing");
    let numbers: Vec<&str> = listing
        .iter()
        .map(|row| row.student_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["SCT-0001", "SCT-0002"]);
    assert_eq!(listing[0].name, "Test sct-0001");

    let missing = campus
        .directory
        .students_by_programme(ProgrammeId(999))
        .expect_err("unknown programme");
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}
